use clap::{Args, Parser, Subcommand};
use dvf_loader::runner::{self, ConnectSettings, LoadArgsBuilder};
use std::path::PathBuf;

#[derive(Parser, Clone)]
#[command(about = "Bulk-load the French DVF transaction dataset into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Connection settings, taken from flags or the standard PG* environment
#[derive(Args, Clone)]
struct ConnectionArgs {
    #[arg(long, env = "PGHOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "PGPORT", default_value = "5433")]
    port: u16,

    #[arg(long, env = "PGUSER", default_value = "user")]
    username: String,

    #[arg(long, env = "PGPASSWORD", default_value = "password", hide_env_values = true)]
    password: String,

    #[arg(long, env = "PGDATABASE", default_value = "real_estate_db")]
    database: String,
}

impl From<ConnectionArgs> for ConnectSettings {
    fn from(args: ConnectionArgs) -> Self {
        ConnectSettings {
            host: args.host,
            port: args.port,
            username: args.username,
            password: args.password,
            database: args.database,
        }
    }
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Load a DVF CSV export, then refresh table statistics
    Load {
        /// Path to the source CSV file
        #[arg(short, long)]
        source: PathBuf,

        /// Target table name
        #[arg(short, long, default_value = "mutations_foncieres")]
        table: String,

        /// Do not create the table when it is missing
        #[arg(long)]
        no_create: bool,

        /// Quiet mode - no progress bar, warnings only
        #[arg(short, long)]
        quiet: bool,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Refresh planner statistics on an already loaded table
    Optimize {
        #[arg(short, long, default_value = "mutations_foncieres")]
        table: String,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Install the trigram extension and build fuzzy-search indexes
    Provision {
        #[arg(short, long, default_value = "mutations_foncieres")]
        table: String,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let quiet = matches!(cli.command, Command::Load { quiet: true, .. });
    init_tracing(quiet);

    match cli.command {
        Command::Load {
            source,
            table,
            no_create,
            quiet,
            connection,
        } => {
            let args = LoadArgsBuilder::default()
                .source(source)
                .table(table)
                .connect(ConnectSettings::from(connection))
                .create_table_if_missing(!no_create)
                .quiet(quiet)
                .build()?;

            let outcome = runner::run_load(args).await?;

            println!();
            println!("Load Summary");
            println!("============");
            println!("Job ID: {}", outcome.job_id);
            println!("Rows loaded: {}", outcome.rows_loaded);
            println!("Bytes sent: {}", outcome.bytes_sent);
            println!("Duration: {:.2}s", outcome.duration.as_secs_f64());
            println!(
                "Throughput: {:.0} rows/sec",
                outcome.rows_loaded as f64 / outcome.duration.as_secs_f64().max(f64::EPSILON)
            );
            if outcome.statistics_refreshed {
                println!("Statistics: refreshed, table ready for queries");
            } else {
                println!("Statistics: STALE - rerun with the `optimize` subcommand");
            }
        }

        Command::Optimize { table, connection } => {
            runner::run_optimize(&ConnectSettings::from(connection), &table).await?;
            println!("Statistics refreshed for \"{}\"", table);
        }

        Command::Provision { table, connection } => {
            let provisioned =
                runner::run_provision(&ConnectSettings::from(connection), &table).await?;
            if provisioned {
                println!("Trigram indexes ready on \"{}\"", table);
            } else {
                println!("Trigram extension unavailable; fuzzy search not provisioned");
            }
        }
    }

    Ok(())
}

fn init_tracing(quiet: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter = if quiet {
        EnvFilter::new("dvf_loader=warn,sqlx=off")
    } else {
        EnvFilter::new("dvf_loader=info,sqlx=off")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
