//! quilt: drive a piece-table document from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Edit a file, commands on stdin
//! quilt notes.txt
//!
//! # With a store config and a named session
//! quilt notes.txt --config quilt.ron --session alice
//!
//! # Scripted
//! printf 'open 2 3\ntable\nsave\n' | quilt notes.txt
//! ```

mod commands;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use quilt_store::{DocumentStore, FsBackend, StoreConfig};

use commands::{Command, HELP, Shell};

/// Collaborative line-range editing over a piece table.
#[derive(Parser, Debug)]
#[command(name = "quilt")]
#[command(about = "Open, edit, and save line regions of a document")]
struct Args {
    /// Document to load
    file: PathBuf,

    /// Store config (RON). Defaults apply when omitted or missing.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name for this editing session in logs. Defaults to the session id.
    #[arg(short, long)]
    session: Option<String>,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => StoreConfig::load_or_default(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };

    let root = args
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = args
        .file
        .file_name()
        .context("document path has no file name")?
        .to_string_lossy()
        .into_owned();

    let store = DocumentStore::new(Arc::new(FsBackend::new(root)), config);
    let document = store
        .load(&name)
        .with_context(|| format!("loading {}", args.file.display()))?;
    let shell = Shell::new(store, document, args.session);
    tracing::info!(
        file = %args.file.display(),
        session = %shell.session(),
        name = shell.name(),
        "ready"
    );

    let mut stdout = io::stdout().lock();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("error: {e:#}");
                eprint!("{HELP}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        match shell.execute(&command) {
            Ok(output) => {
                stdout.write_all(output.as_bytes())?;
                stdout.flush()?;
            }
            Err(e) => eprintln!("error: {e:#}"),
        }
    }

    let released = shell.store().release_session(shell.session());
    if released > 0 {
        tracing::warn!(released, "exiting with open regions; released them");
    }
    Ok(())
}
