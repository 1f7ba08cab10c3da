#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use awdb_core::reqwest::AppwriteClient;
use awdb_core::{Collection, DeleteOptions, InitProjectOptions, Project, QueryControl, QueryItem};

use crate::config::{Cli, Command, TargetArgs};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "awdb_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "awdb_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "awdb_cli::config";
pub const TRACING_TARGET_COMMAND: &str = "awdb_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::debug!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    telemetry::init_tracing()?;
    cli.log();

    let project = connect(&cli).await?;

    match &cli.command {
        Command::Tree => print_tree(&project),
        Command::Query { target, limit } => {
            let collection = find_collection(&project, target)?;
            print_documents(collection, target, *limit).await
        }
        Command::Delete { target, limit } => {
            let collection = find_collection(&project, target)?;
            delete_documents(collection, target, *limit).await
        }
    }
}

/// Connects to the project and loads the full resource tree.
async fn connect(cli: &Cli) -> anyhow::Result<Project> {
    let settings = cli
        .project
        .resolve()
        .context("invalid project configuration")?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %settings.endpoint,
        project_id = %settings.project_id,
        "connecting to project"
    );

    let client = AppwriteClient::new(settings, cli.http.clone())
        .context("failed to create HTTP client")?;

    let mut project = Project::new(cli.project.clone());
    project
        .init_with_api(Arc::new(client), InitProjectOptions::with_databases())
        .await
        .context("failed to load databases")?;

    Ok(project)
}

fn find_collection<'a>(project: &'a Project, target: &TargetArgs) -> anyhow::Result<&'a Collection> {
    let database = project
        .databases()?
        .get_database(&target.database)
        .with_context(|| format!("cannot resolve database '{}'", target.database))?;

    database
        .get_collection(&target.collection)
        .with_context(|| format!("cannot resolve collection '{}'", target.collection))
}

fn print_tree(project: &Project) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();

    for database in project.databases()?.iter()? {
        writeln!(out, "{} ({})", database.name(), database.id())?;

        for collection in database.iter()? {
            writeln!(out, "  {} ({})", collection.name(), collection.id())?;

            for attribute in collection.iter()? {
                writeln!(out, "    attribute {}: {}", attribute.key(), attribute.kind())?;
            }

            for index in collection.index_list()? {
                writeln!(
                    out,
                    "    index {} [{}]: {}",
                    index.key(),
                    index.kind(),
                    index.attributes().join(", ")
                )?;
            }
        }
    }

    Ok(())
}

/// Whether the item is the last one a `limit` allows.
fn reached(item: &QueryItem, limit: Option<u64>) -> bool {
    limit.is_some_and(|limit| item.index + 1 >= limit)
}

async fn print_documents(
    collection: &Collection,
    target: &TargetArgs,
    limit: Option<u64>,
) -> anyhow::Result<()> {
    if limit == Some(0) {
        return Ok(());
    }

    let mut cursor = collection.query(target.query_options())?;

    while let Some(item) = cursor.next().await? {
        println!("{}", serde_json::to_string(&item.document)?);

        if reached(&item, limit) {
            cursor.cancel();
        }
    }

    Ok(())
}

async fn delete_documents(
    collection: &Collection,
    target: &TargetArgs,
    limit: Option<u64>,
) -> anyhow::Result<()> {
    if limit == Some(0) {
        return Ok(());
    }

    let options = DeleteOptions::new(target.query_options())
        .with_drain_control(move |item| {
            if reached(item, limit) {
                QueryControl::Cancel
            } else {
                QueryControl::Continue
            }
        })
        .on_progress(|progress| async move {
            tracing::info!(
                target: TRACING_TARGET_COMMAND,
                document_id = %progress.document,
                index = progress.index,
                count = progress.count,
                "document deleted"
            );
            Ok(())
        });

    let deleted = collection
        .delete_many(options)
        .await
        .context("bulk delete aborted")?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        collection = collection.name(),
        deleted,
        "bulk delete finished"
    );

    Ok(())
}
