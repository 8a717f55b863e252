//! Intake CLI
//!
//! Drives the document-intake workflow from a terminal.
//!
//! # Usage
//!
//! ```bash
//! intake-cli services
//! intake-cli fields --service health-assessment --service tax-planning
//! intake-cli submit --service health-assessment --answers answers.json \
//!     --file medical-reports=./report.pdf
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use intake_core::client::SiteClient;
use intake_core::{FileHandle, FormValue, IntakeSession, CATALOG};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod answers;

#[derive(Parser)]
#[command(name = "intake-cli")]
#[command(version, about = "Service intake command line", long_about = None)]
struct Cli {
    /// Site API base URL
    #[arg(long, env = "SITE_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List offered services
    Services,
    /// Print the consolidated fields for a selection of services
    Fields {
        #[arg(long = "service", required = true)]
        services: Vec<String>,
    },
    /// Upload files and submit answers for a selection of services
    Submit {
        #[arg(long = "service", required = true)]
        services: Vec<String>,

        /// JSON file with answers keyed by field id
        #[arg(long)]
        answers: PathBuf,

        /// File attachment as <field-id>=<path>; repeatable
        #[arg(long = "file")]
        files: Vec<String>,

        /// Submission id (random when omitted)
        #[arg(long)]
        id: Option<String>,
    },
}

/// Split `<field-id>=<path>`
fn parse_file_arg(arg: &str) -> Result<(String, PathBuf)> {
    let (field_id, path) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected <field-id>=<path>, got '{}'", arg))?;
    if field_id.is_empty() || path.is_empty() {
        bail!("expected <field-id>=<path>, got '{}'", arg);
    }
    Ok((field_id.to_string(), PathBuf::from(path)))
}

async fn read_file(path: &Path) -> Result<FileHandle> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    Ok(FileHandle::new(name, data))
}

async fn submit(
    api_url: &str,
    services: Vec<String>,
    answers_path: PathBuf,
    files: Vec<String>,
    id: Option<String>,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&answers_path)
        .await
        .with_context(|| format!("Failed to read {}", answers_path.display()))?;
    let document: serde_json::Value =
        serde_json::from_str(&raw).context("Answers file is not valid JSON")?;

    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut session = IntakeSession::new(&CATALOG, id, services);
    *session.state_mut() = answers::load_answers(&CATALOG, &document)?;

    // Group attachments per field; each field gets one selection
    let mut selections: Vec<(String, Vec<FileHandle>)> = Vec::new();
    for arg in &files {
        let (field_id, path) = parse_file_arg(arg)?;
        let handle = read_file(&path).await?;
        match selections.iter_mut().find(|(id, _)| *id == field_id) {
            Some((_, handles)) => handles.push(handle),
            None => selections.push((field_id, vec![handle])),
        }
    }
    for (field_id, handles) in selections {
        session.state_mut().select_files(&field_id, handles);
        if let Some(FormValue::Files(set)) = session.state().get(&field_id) {
            if let Some(error) = &set.error {
                bail!("{}: {}", field_id, error);
            }
        }
    }

    let client = SiteClient::new(api_url);
    let document = session.submit(&client, &client).await?;

    info!(id = session.id(), fields = document.len(), "Submitted");
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Services => {
            for service in CATALOG.services() {
                println!("{:<24} {} ({} fields)", service.id, service.title, service.fields.len());
            }
        }
        Commands::Fields { services } => {
            let fields = CATALOG.fields_for(services.as_slice());
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        Commands::Submit {
            services,
            answers,
            files,
            id,
        } => submit(&cli.api_url, services, answers, files, id).await?,
    }

    Ok(())
}
