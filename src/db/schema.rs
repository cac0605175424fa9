use anyhow::Result;

use crate::error::IngestError;

/// SQL data type for a destination column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Numeric,
    DoublePrecision,
    Date,
}

impl SqlType {
    /// Returns the Postgres type name
    pub fn to_postgres(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Numeric => "NUMERIC",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Date => "DATE",
        }
    }
}

/// A column in the destination schema
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// Ordered schema definition for a destination table.
///
/// The column list is authoritative: header validation, type coercion and the
/// generated COPY statement all derive from it.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

const fn col(name: &'static str, sql_type: SqlType, nullable: bool) -> Column {
    Column {
        name,
        sql_type,
        nullable,
    }
}

/// The fixed 39-column layout of the DVF "full" CSV export.
///
/// One row is one mutation record: a single real-estate transaction event
/// affecting one parcel (a mutation touching several parcels or lots appears
/// as several rows sharing `id_mutation`/`numero_disposition`, so no unique
/// constraint exists on that pair).
pub fn mutations_schema() -> TableSchema {
    use SqlType::*;
    TableSchema {
        columns: vec![
            col("id_mutation", Text, false),
            col("date_mutation", Date, false),
            col("numero_disposition", Integer, false),
            col("nature_mutation", Text, false),
            col("valeur_fonciere", Numeric, true),
            col("adresse_numero", Integer, true),
            col("adresse_suffixe", Text, true),
            col("adresse_nom_voie", Text, true),
            col("adresse_code_voie", Text, true),
            col("code_postal", Text, true),
            col("code_commune", Text, false),
            col("nom_commune", Text, false),
            col("code_departement", Text, false),
            col("ancien_code_commune", Text, true),
            col("ancien_nom_commune", Text, true),
            col("id_parcelle", Text, false),
            col("ancien_id_parcelle", Text, true),
            col("numero_volume", Text, true),
            col("lot1_numero", Text, true),
            col("lot1_surface_carrez", Numeric, true),
            col("lot2_numero", Text, true),
            col("lot2_surface_carrez", Numeric, true),
            col("lot3_numero", Text, true),
            col("lot3_surface_carrez", Numeric, true),
            col("lot4_numero", Text, true),
            col("lot4_surface_carrez", Numeric, true),
            col("lot5_numero", Text, true),
            col("lot5_surface_carrez", Numeric, true),
            col("nombre_lots", Integer, false),
            col("code_type_local", Text, true),
            col("type_local", Text, true),
            col("surface_reelle_bati", Integer, true),
            col("code_nature_culture", Text, true),
            col("nature_culture", Text, true),
            col("code_nature_culture_speciale", Text, true),
            col("nature_culture_speciale", Text, true),
            col("surface_terrain", Numeric, true),
            col("longitude", DoublePrecision, true),
            col("latitude", DoublePrecision, true),
        ],
    }
}

impl TableSchema {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Validate the source header against the declared column list.
    ///
    /// Policy is strict: any count mismatch, name mismatch or order-only
    /// mismatch rejects the file. The DVF export format is fixed, so a header
    /// that deviates means the wrong file is being loaded.
    pub fn validate_header<'a, I>(&self, header: I) -> Result<(), IngestError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let found: Vec<&str> = header.into_iter().collect();

        if found.len() != self.columns.len() {
            return Err(IngestError::HeaderLength {
                expected: self.columns.len(),
                found: found.len(),
            });
        }

        for (position, (expected, actual)) in self.columns.iter().zip(&found).enumerate() {
            if expected.name != actual.trim() {
                return Err(IngestError::HeaderMismatch {
                    position: position + 1,
                    expected: expected.name.to_string(),
                    found: actual.trim().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Generate `CREATE TABLE IF NOT EXISTS` DDL for this schema
    pub fn create_table_ddl(&self, table_name: &str) -> String {
        let mut ddl = format!("CREATE TABLE IF NOT EXISTS \"{}\" (\n", table_name);

        let column_defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let nullable_clause = if c.nullable { "" } else { " NOT NULL" };
                format!("  \"{}\" {}{}", c.name, c.sql_type.to_postgres(), nullable_clause)
            })
            .collect();

        ddl.push_str(&column_defs.join(",\n"));
        ddl.push_str("\n);");

        ddl
    }

    /// Generate the COPY statement naming every column in declared order.
    ///
    /// Text format with the default `\N` null marker; the encoder produces
    /// matching payload lines.
    pub fn copy_statement(&self, table_name: &str) -> String {
        let col_names: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect();
        format!(
            "COPY \"{}\" ({}) FROM STDIN",
            table_name,
            col_names.join(", ")
        )
    }
}

/// Reject table names that would need quoting games when spliced into DDL,
/// COPY and VACUUM statements.
pub fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        anyhow::bail!(
            "Invalid table name '{}': use lowercase letters, digits and underscores",
            name
        );
    }
}
