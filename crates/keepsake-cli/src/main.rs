//! Keepsake CLI: guest uploads and gallery for an event.
//!
//! Configure the backends through the environment or a `.env` file
//! (SUPABASE_URL, SUPABASE_ANON_KEY, EVENT_PASSWORD, ...).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use keepsake_cli::{init_tracing, read_selection, truncate_string, Services};
use keepsake_core::config::session_path_from_env;
use keepsake_core::{format_file_size, Config, Credentials};
use keepsake_processing::BatchStatus;
use keepsake_services::{EventGate, SessionCache};
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keepsake", about = "Share photos and videos from the event")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enter the event password and remember it on this machine
    Login {
        /// Your name, shown next to your uploads
        #[arg(long)]
        name: Option<String>,
        /// Event password; read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the remembered login
    Logout,
    /// Show the remembered login
    Whoami,
    /// Upload photos and videos
    Upload {
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Uploader name; defaults to the name given at login
        #[arg(long)]
        name: Option<String>,
    },
    /// List the gallery and remove entries whose files are gone
    Gallery {
        /// Skip the existence check
        #[arg(long)]
        no_verify: bool,
    },
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Event password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn require_session(gate: &EventGate, cache: &SessionCache) -> anyhow::Result<Credentials> {
    match gate.resume(cache) {
        Some(credentials) => Ok(credentials),
        None => bail!("Not logged in. Run `keepsake login` first."),
    }
}

async fn upload(
    config: Config,
    credentials: Credentials,
    paths: Vec<PathBuf>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let files = read_selection(&paths, config.max_video_size_bytes).await?;
    let services = Services::connect(config).await?;
    let uploader = name.or_else(|| Some(credentials.name).filter(|n| !n.is_empty()));

    let report = services
        .orchestrator()
        .upload_batch(files, uploader.as_deref())
        .await?;

    for file in report.uploaded() {
        println!(
            "  uploaded  {} ({}) -> {}",
            file.file_name,
            format_file_size(file.size_bytes),
            file.public_url
        );
    }
    for (original_name, error) in report.failures() {
        println!("  failed    {}: {}", original_name, error);
    }

    match report.status() {
        BatchStatus::Complete => {
            println!("{}", report.success_message());
            Ok(())
        }
        BatchStatus::Partial => bail!(
            "Uploaded {} of {} files; {} failed",
            report.succeeded(),
            report.outcomes.len(),
            report.failed()
        ),
        BatchStatus::Failed => match report.into_result() {
            Err(e) => Err(e).context("Upload failed"),
            Ok(_) => bail!("Upload failed"),
        },
    }
}

async fn gallery(config: Config, no_verify: bool) -> anyhow::Result<()> {
    let services = Services::connect(config).await?;
    let session = services
        .reconciler()?
        .activate()
        .await
        .context("Failed to load gallery")?;

    if session.redirect_to_upload_after().is_some() {
        println!("No memories yet. Run `keepsake upload` to share the first one!");
        return Ok(());
    }

    println!("{}", session.count_label());
    for entry in session.entries() {
        println!(
            "  {:>6}  {}  {:<24}  {:<32}  {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            truncate_string(entry.uploader_name.as_deref().unwrap_or("Guest"), 24),
            truncate_string(&entry.file_name, 32),
            entry.thumbnail_url
        );
    }

    if no_verify {
        return Ok(());
    }

    session.start_verification();
    if let Some(summary) = session.wait_for_verification().await {
        if summary.missing > 0 {
            println!(
                "Removed {} missing file(s); {} now",
                summary.missing,
                session.count_label()
            );
        }
    }
    session.close();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Logout = cli.command {
        SessionCache::at_path(session_path_from_env()).clear();
        println!("Logged out");
        return Ok(());
    }

    let config = Config::from_env().context("Invalid configuration")?;
    let cache = SessionCache::from_config(&config);

    match cli.command {
        Commands::Login { name, password } => {
            let gate = EventGate::from_config(&config)?;
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let credentials = gate.login(
                &cache,
                name.as_deref().unwrap_or_default(),
                &password,
                config.session_ttl_hours,
            )?;
            if credentials.name.is_empty() {
                println!("Welcome!");
            } else {
                println!("Welcome, {}!", credentials.name);
            }
        }
        // Handled before configuration is loaded.
        Commands::Logout => {}
        Commands::Whoami => {
            let gate = EventGate::from_config(&config)?;
            match gate.resume(&cache) {
                Some(credentials) if !credentials.name.is_empty() => {
                    println!("{}", credentials.name)
                }
                Some(_) => println!("Logged in as a guest"),
                None => println!("Not logged in"),
            }
        }
        Commands::Upload { paths, name } => {
            let gate = EventGate::from_config(&config)?;
            let credentials = require_session(&gate, &cache)?;
            upload(config, credentials, paths, name).await?;
        }
        Commands::Gallery { no_verify } => {
            let gate = EventGate::from_config(&config)?;
            require_session(&gate, &cache)?;
            gallery(config, no_verify).await?;
        }
    }

    Ok(())
}
