// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `msc`: replay, validate and inspect message sequence documents.
//!
//! File commands read a JSON snapshot (as written by `SequenceEditor::export`)
//! and print JSON on stdout. `sequences` commands work against the filesystem
//! repository; its root is `--root`, else the `storage_dir` preference, else
//! `sequences/` under the config dir. Logs go to stderr.
#![allow(clippy::print_stdout)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use msc_app_core::config::ConfigService;
use msc_app_core::prefs::{EditorPrefs, EDITOR_PREFS_KEY};
use msc_config_fs::{FsConfigStore, FsSequenceRepository};
use msc_core::rrc::allowed_messages;
use msc_core::{
    compute_actor_states, parse_snapshot, rrc_state_at, validate_sequence, ListFilter, Sequence,
    SequenceEditor, SequenceId, SequenceRepository, Violation,
};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Message sequence chart tools")]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Sequence storage root (overrides the `storage_dir` preference).
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-actor identifiers, configurations and state.
    States {
        /// Sequence snapshot (JSON).
        file: PathBuf,
        /// Replay only messages `0..=N`.
        #[arg(long)]
        as_of: Option<usize>,
    },
    /// Run sequence checks. Exits non-zero when any error is found.
    Validate {
        /// Sequence snapshot (JSON).
        file: PathBuf,
    },
    /// RRC connection state after replay.
    Rrc {
        /// Sequence snapshot (JSON).
        file: PathBuf,
        /// Replay only messages `0..=N`.
        #[arg(long)]
        as_of: Option<usize>,
    },
    /// Stored sequences.
    #[command(subcommand)]
    Sequences(SequencesCommand),
}

#[derive(Subcommand, Debug)]
enum SequencesCommand {
    /// List stored sequences, newest first.
    List {
        /// Only this protocol.
        #[arg(long)]
        protocol: Option<String>,
        /// Only this session.
        #[arg(long)]
        session: Option<String>,
        /// Print a table instead of JSON.
        #[arg(long)]
        table: bool,
    },
    /// Print one stored sequence.
    Show {
        /// Sequence id.
        id: String,
    },
    /// Store a snapshot file, replacing any sequence with the same id.
    /// Duplicate message ids are re-minted and message warnings recomputed.
    Import {
        /// Sequence snapshot (JSON).
        file: PathBuf,
        /// Assign the sequence to this session.
        #[arg(long)]
        session: Option<String>,
    },
    /// Delete a stored sequence.
    Delete {
        /// Sequence id.
        id: String,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.cmd {
        Command::States { file, as_of } => {
            let sequence = read_snapshot(&file)?;
            let states = compute_actor_states(&sequence, as_of);
            print_json(&states)?;
        }
        Command::Validate { file } => {
            let sequence = read_snapshot(&file)?;
            let violations = validate_sequence(&sequence);
            print_json(&violations)?;
            if violations.iter().any(Violation::is_error) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Rrc { file, as_of } => {
            let sequence = read_snapshot(&file)?;
            let state = rrc_state_at(&sequence, as_of);
            print_json(&json!({
                "state": state,
                "description": state.description(),
                "allowedMessages": allowed_messages(state),
            }))?;
        }
        Command::Sequences(cmd) => {
            let root = storage_root(args.root)?;
            info!(root = %root.display(), "sequence repository");
            let repo = FsSequenceRepository::open(&root)
                .with_context(|| format!("opening repository at {}", root.display()))?;
            return sequences(repo, cmd);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn sequences(mut repo: FsSequenceRepository, cmd: SequencesCommand) -> Result<ExitCode> {
    match cmd {
        SequencesCommand::List {
            protocol,
            session,
            table,
        } => {
            let filter = ListFilter {
                protocol,
                session_id: session,
            };
            let found = repo.list(&filter)?;
            debug!(count = found.len(), "listed sequences");
            if table {
                println!("{}", summary_table(&found));
            } else {
                let rows: Vec<_> = found.iter().map(summary).collect();
                print_json(&rows)?;
            }
        }
        SequencesCommand::Show { id } => {
            let Some(sequence) = repo.get(&SequenceId::new(id.as_str()))? else {
                bail!("no stored sequence with id {id}");
            };
            print_json(&sequence)?;
        }
        SequencesCommand::Import { file, session } => {
            let text = read_text(&file)?;
            let imported = SequenceEditor::new()
                .import(&text)
                .with_context(|| format!("importing {}", file.display()))?;
            let mut sequence = Sequence::clone(&imported);
            if session.is_some() {
                sequence.session_id = session;
            }
            repo.save(&sequence)?;
            print_json(&summary(&sequence))?;
        }
        SequencesCommand::Delete { id } => {
            if !repo.delete(&SequenceId::new(id.as_str()))? {
                bail!("no stored sequence with id {id}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn storage_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root);
    }
    let store = FsConfigStore::new().context("resolving config dir")?;
    let base = store.base().to_path_buf();
    let prefs: EditorPrefs = ConfigService::new(store).load_or_default(EDITOR_PREFS_KEY);
    Ok(prefs.storage_dir.unwrap_or_else(|| base.join("sequences")))
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_snapshot(path: &Path) -> Result<Sequence> {
    let text = read_text(path)?;
    let sequence = parse_snapshot(&text).with_context(|| format!("parsing {}", path.display()))?;
    debug!(id = %sequence.id, messages = sequence.len(), "loaded snapshot");
    Ok(sequence)
}

fn summary(sequence: &Sequence) -> serde_json::Value {
    json!({
        "id": sequence.id,
        "name": sequence.name,
        "protocol": sequence.protocol,
        "sessionId": sequence.session_id,
        "messages": sequence.len(),
    })
}

fn summary_table(found: &[Sequence]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["id", "name", "protocol", "session", "messages"]);
    for sequence in found {
        table.add_row(vec![
            sequence.id.to_string(),
            sequence.name.clone(),
            sequence.protocol.clone(),
            sequence.session_id.clone().unwrap_or_default(),
            sequence.len().to_string(),
        ]);
    }
    table
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
