// [apps/orchestrator/src/bin/migrator.rs]
//! Standalone schema-migration tool: applies the base schema and every
//! pending versioned migration against a target store, or rolls back
//! to an earlier version with `--rollback-to`. Intended to run ahead
//! of a deploy, separate from the orchestrator binary's own
//! self-migration on connect.

use std::process::ExitCode;

use clap::Parser;
use nebula_infra_db::errors::DbError;
use nebula_infra_db::{migrations, schema, TursoClient};
use tracing::{error, info};

/// Exit codes follow BSD sysexits.h conventions so deploy scripts can
/// branch on failure class without parsing log text.
const EXIT_USAGE: u8 = 64;
const EXIT_DATAERR: u8 = 65;
const EXIT_IOERR: u8 = 74;
const EXIT_TEMPFAIL: u8 = 75;

#[derive(Debug, Parser)]
#[command(name = "migrator", about = "Applies or rolls back the store schema")]
struct Args {
    #[arg(long, env = "NEBULA__DATABASE__URL", default_value = ":memory:")]
    database_url: String,

    #[arg(long, env = "NEBULA__DATABASE__AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Roll back to (and including above) this schema version instead
    /// of applying pending migrations forward.
    #[arg(long)]
    rollback_to: Option<i64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    nebula_shared_observability::init_tracing("migrator");
    let args = Args::parse();

    if args.database_url.is_empty() {
        error!("database url must not be empty");
        return ExitCode::from(EXIT_USAGE);
    }

    // `TursoClient::connect` already applies the base schema and every
    // pending migration as part of establishing the connection, so a
    // forward run is really a confirmation that the ledger is clean.
    let client = match TursoClient::connect(&args.database_url, args.auth_token.clone()).await {
        Ok(client) => client,
        Err(DbError::ConnectionError(msg)) => {
            error!(%msg, "could not reach the store");
            return ExitCode::from(EXIT_TEMPFAIL);
        }
        Err(DbError::ConfigurationError(msg)) => {
            error!(%msg, "invalid store configuration");
            return ExitCode::from(EXIT_USAGE);
        }
        Err(DbError::MigrationChecksumMismatch { version }) => {
            error!(version, "a migration's checksum no longer matches its recorded value");
            return ExitCode::from(EXIT_DATAERR);
        }
        Err(err) => {
            error!(%err, "store connection failed");
            return ExitCode::from(EXIT_IOERR);
        }
    };

    if let Some(target_version) = args.rollback_to {
        let connection = match client.get_connection() {
            Ok(connection) => connection,
            Err(err) => {
                error!(%err, "could not acquire a connection for rollback");
                return ExitCode::from(EXIT_IOERR);
            }
        };

        if let Err(err) = migrations::rollback_to(&connection, target_version).await {
            error!(%err, target_version, "rollback failed");
            return ExitCode::from(EXIT_DATAERR);
        }

        info!(target_version, "rollback complete");
        return ExitCode::SUCCESS;
    }

    let connection = match client.get_connection() {
        Ok(connection) => connection,
        Err(err) => {
            error!(%err, "could not acquire a connection to verify schema state");
            return ExitCode::from(EXIT_IOERR);
        }
    };

    if let Err(err) = schema::apply_base_schema(&connection).await {
        error!(%err, "base schema verification failed");
        return ExitCode::from(EXIT_DATAERR);
    }

    info!("schema is up to date");
    ExitCode::SUCCESS
}
