#[macro_use]
extern crate log;

use std::io::Write;
use std::sync::Arc;
use std::{env, thread};

use anyhow::{Context, Result};
use chrono::Local;
use env_logger::Env;
use structopt::StructOpt;

use crate::args::Args;
use crate::audit::mysql::MySqlAuditStore;
use crate::audit::Direction;
use crate::common::helpers::print_error_chain;
use crate::config::Config;
use crate::connection::{DatabaseConnection, SqlxMySqlConnection};
use crate::history::mysql::MySqlHistoryStore;
use crate::migrate::migration_options::MigrationOptions;
use crate::migrate::MigrationOrchestrator;
use crate::mutate::mysql::MySqlSchemaMutator;

mod args;
mod audit;
mod catalog;
mod common;
mod config;
mod connection;
mod history;
#[cfg(test)]
mod memory;
mod migrate;
mod migrations;
mod mutate;
mod track;
mod verify;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(errors) = init().await.with_context(|| "Migration run failed") {
        print_error_chain(&errors);
        std::process::exit(1);
    }
}

async fn init() -> Result<()> {
    let options = Args::from_args();

    initialize_logger(options.verbose, options.quiet);

    let config = Config::load(&options.config).context("Failed to load config")?;

    info!(
        "Connecting to {}:{}/{}...",
        config.database().host,
        config.database().port,
        config.database().database
    );

    // Every read and write goes through one logical connection
    let connection = SqlxMySqlConnection::new(config.database(), 1).await?;

    let result = run_migrations(&connection, &config, &options).await;

    connection.close().await;

    result
}

async fn run_migrations(
    connection: &SqlxMySqlConnection,
    config: &Config,
    options: &Args,
) -> Result<()> {
    let settings = config.settings();

    let migration_options = MigrationOptions {
        strict_verify: options.strict || settings.strict_verify,
        environment: settings.environment.clone(),
        database: config.database().database.clone(),
        baseline_exclusions: settings.baseline_exclusions.clone(),
    };

    let orchestrator = MigrationOrchestrator::new(
        Arc::new(MySqlSchemaMutator::new(connection.pool.clone())),
        Arc::new(MySqlAuditStore::new(connection.pool.clone())),
        Arc::new(MySqlHistoryStore::new(connection.pool.clone())),
        migrations::all(),
        migration_options,
    );

    if options.list {
        let pending = orchestrator.pending().await?;
        if pending.is_empty() {
            info!("No pending migrations");
        }
        for name in pending {
            info!("Pending: {}", name);
        }
        return Ok(());
    }

    let direction = if options.undo {
        Direction::Down
    } else {
        Direction::Up
    };

    orchestrator.run(direction).await?;

    Ok(())
}

fn initialize_logger(verbose: bool, quiet: bool) {
    if quiet {
        env::set_var("RUST_LOG", "warn");
    } else if env::var("RUST_LOG").is_err() || verbose {
        env::set_var("RUST_LOG", if verbose { "debug" } else { "info" });
    }

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("sqlx", log::LevelFilter::Error)
        .format(|buf, record| {
            let timestamp = Local::now().format("%H:%M:%S");

            writeln!(
                buf,
                "{} {:<5} [{}] - {}",
                timestamp,
                record.level(),
                thread::current().name().unwrap_or("<unnamed>"),
                record.args()
            )
        })
        .init();
}
