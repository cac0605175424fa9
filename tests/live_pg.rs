//! End-to-end tests against a live PostgreSQL instance.
//!
//! Ignored by default; run with a database available:
//!
//! ```text
//! PGHOST=localhost PGPORT=5433 PGUSER=user PGPASSWORD=password \
//!   PGDATABASE=real_estate_db cargo test -- --ignored
//! ```

use std::io::Write;

use dvf_loader::runner::{self, ConnectSettings, LoadArgsBuilder};
use sqlx::postgres::PgPool;
use tempfile::NamedTempFile;

const HEADER: &str = "id_mutation,date_mutation,numero_disposition,nature_mutation,\
valeur_fonciere,adresse_numero,adresse_suffixe,adresse_nom_voie,adresse_code_voie,\
code_postal,code_commune,nom_commune,code_departement,ancien_code_commune,\
ancien_nom_commune,id_parcelle,ancien_id_parcelle,numero_volume,lot1_numero,\
lot1_surface_carrez,lot2_numero,lot2_surface_carrez,lot3_numero,lot3_surface_carrez,\
lot4_numero,lot4_surface_carrez,lot5_numero,lot5_surface_carrez,nombre_lots,\
code_type_local,type_local,surface_reelle_bati,code_nature_culture,nature_culture,\
code_nature_culture_speciale,nature_culture_speciale,surface_terrain,longitude,latitude";

fn settings() -> ConnectSettings {
    ConnectSettings {
        host: std::env::var("PGHOST").unwrap_or_else(|_| "localhost".into()),
        port: std::env::var("PGPORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5433),
        username: std::env::var("PGUSER").unwrap_or_else(|_| "user".into()),
        password: std::env::var("PGPASSWORD").unwrap_or_else(|_| "password".into()),
        database: std::env::var("PGDATABASE").unwrap_or_else(|_| "real_estate_db".into()),
    }
}

async fn test_pool() -> PgPool {
    let s = settings();
    let url = format!(
        "postgres://{}:{}@{}:{}/{}",
        s.username, s.password, s.host, s.port, s.database
    );
    PgPool::connect(&url).await.expect("test database reachable")
}

/// One syntactically valid DVF row; id/parcelle/value vary per call site.
fn row(id_mutation: &str, parcelle: &str, valeur: &str, lot1_numero: &str) -> String {
    format!(
        "{id_mutation},2017-01-05,1,Vente,{valeur},12,,RUE DE LA PAIX,0100,75002,\
75102,Paris 2e Arrondissement,75,,,{parcelle},,,{lot1_numero},,,,,,,,,,0,1,Maison,90,\
,,,,430,2.347000,48.866000"
    )
}

fn write_csv(rows: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for r in rows {
        writeln!(file, "{}", r).unwrap();
    }
    file.flush().unwrap();
    file
}

async fn fresh_table(pool: &PgPool, name: &str) {
    sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", name))
        .execute(pool)
        .await
        .unwrap();
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

fn load_args(file: &NamedTempFile, table: &str) -> runner::LoadArgs {
    LoadArgsBuilder::default()
        .source(file.path().to_path_buf())
        .table(table)
        .connect(settings())
        .quiet(true)
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn load_well_formed_file_commits_every_row() {
    let pool = test_pool().await;
    let table = "dvf_test_roundtrip";
    fresh_table(&pool, table).await;

    let file = write_csv(&[
        row("2017-1", "75102000AB0001", "150000", ""),
        row("2017-2", "75102000AB0002", "230000.50", "101"),
        row("2017-3", "75102000AB0003", "", ""),
    ]);

    let outcome = runner::run_load(load_args(&file, table)).await.unwrap();
    assert_eq!(outcome.rows_loaded, 3);
    assert!(outcome.statistics_refreshed);
    assert_eq!(count(&pool, table).await, 3);
}

#[tokio::test]
#[ignore]
async fn empty_field_stored_as_null_not_empty_string() {
    let pool = test_pool().await;
    let table = "dvf_test_nulls";
    fresh_table(&pool, table).await;

    let file = write_csv(&[row("2017-1", "75102000AB0001", "150000", "")]);
    runner::run_load(load_args(&file, table)).await.unwrap();

    let nulls: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM \"{}\" WHERE lot1_numero IS NULL",
        table
    ))
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(nulls, 1);

    let empties: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM \"{}\" WHERE lot1_numero = ''",
        table
    ))
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(empties, 0);
}

#[tokio::test]
#[ignore]
async fn duplicate_composite_keys_load_as_distinct_rows() {
    let pool = test_pool().await;
    let table = "dvf_test_duplicates";
    fresh_table(&pool, table).await;

    // One mutation touching two parcels: same id_mutation and disposition.
    let file = write_csv(&[
        row("2017-9", "75102000AB0001", "500000", ""),
        row("2017-9", "75102000AB0002", "500000", ""),
    ]);

    let outcome = runner::run_load(load_args(&file, table)).await.unwrap();
    assert_eq!(outcome.rows_loaded, 2);
    assert_eq!(count(&pool, table).await, 2);
}

#[tokio::test]
#[ignore]
async fn type_error_aborts_load_with_zero_rows_committed() {
    let pool = test_pool().await;
    let table = "dvf_test_abort";
    fresh_table(&pool, table).await;

    let file = write_csv(&[
        row("2017-1", "75102000AB0001", "150000", ""),
        row("2017-2", "75102000AB0002", "abc", ""), // bad valeur_fonciere
        row("2017-3", "75102000AB0003", "90000", ""),
    ]);

    let err = runner::run_load(load_args(&file, table)).await.unwrap_err();
    assert!(err.to_string().contains("valeur_fonciere"));

    // Atomicity: the first, valid row must not be visible either.
    assert_eq!(count(&pool, table).await, 0);
}

#[tokio::test]
#[ignore]
async fn statistics_refresh_is_idempotent() {
    let pool = test_pool().await;
    let table = "dvf_test_optimize";
    fresh_table(&pool, table).await;

    let file = write_csv(&[row("2017-1", "75102000AB0001", "150000", "")]);
    runner::run_load(load_args(&file, table)).await.unwrap();

    let connect = settings();
    runner::run_optimize(&connect, table).await.unwrap();
    runner::run_optimize(&connect, table).await.unwrap();

    assert_eq!(count(&pool, table).await, 1);
}

#[tokio::test]
#[ignore]
async fn header_mismatch_rejects_file() {
    let pool = test_pool().await;
    let table = "dvf_test_header";
    fresh_table(&pool, table).await;

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER.replace("valeur_fonciere", "prix")).unwrap();
    writeln!(file, "{}", row("2017-1", "75102000AB0001", "150000", "")).unwrap();
    file.flush().unwrap();

    let err = runner::run_load(load_args(&file, table)).await.unwrap_err();
    assert!(err.to_string().contains("header mismatch"));
}
