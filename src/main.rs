//! Chat Window - Entry Point
//!
//! Replays a host script against the headless chat page and prints one JSON
//! snapshot per step.

use chatwin::config::{FileStore, MemoryStore, SettingsStore};
use chatwin::locator::Locator;
use chatwin::model::AppError;
use chatwin::sim::{parse_script, run_script, Simulation, Snapshot, Step};
use clap::Parser;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Location the replayed conversation starts at.
const START_LOCATION: &str = "https://chat.example.com/c/demo";

/// Chat Window - replay host activity against the visibility window
#[derive(Parser, Debug)]
#[command(name = "chatwin")]
#[command(version)]
#[command(about = "Replay chat host activity through the visibility window and print snapshots")]
pub struct Args {
    /// Path to a JSON-lines script (reads from stdin if not provided)
    pub script: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Settings file to use as the store (in-memory store if not provided)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // Defaults → Config File → Env Vars → CLI Args
    let config = {
        let config_file = chatwin::config::load_config_with_precedence(args.config.clone())?;
        let merged = chatwin::config::merge_config(config_file);
        let with_env = chatwin::config::apply_env_overrides(merged);
        chatwin::config::apply_cli_overrides(with_env, args.log_file.clone(), args.settings.clone())
    };

    chatwin::logging::init(&config.log_file_path)?;

    info!(
        config = ?config,
        "Configuration loaded and resolved"
    );

    let locator = Locator::new(&config.patterns)?;
    let steps = parse_script(&read_script(args.script.as_deref())?)?;

    let snapshots = match &config.settings_path {
        Some(path) => replay(locator, FileStore::open(path), &steps)?,
        None => replay(locator, MemoryStore::new(), &steps)?,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for snapshot in &snapshots {
        serde_json::to_writer(&mut out, snapshot).map_err(std::io::Error::from)?;
        writeln!(out)?;
    }
    Ok(())
}

fn read_script(path: Option<&Path>) -> Result<String, AppError> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

fn replay<S: SettingsStore>(
    locator: Locator,
    store: S,
    steps: &[Step],
) -> Result<Vec<Snapshot>, AppError> {
    let mut sim = Simulation::with_parts(START_LOCATION, 0, locator, store);
    let snapshots = run_script(&mut sim, steps)?;
    info!(steps = steps.len(), "Replay finished");
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_help_does_not_error() {
        let result = Args::try_parse_from(["chatwin", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_does_not_error() {
        let result = Args::try_parse_from(["chatwin", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_no_args_defaults() {
        let args = Args::parse_from(["chatwin"]);
        assert_eq!(args.script, None);
        assert_eq!(args.config, None);
        assert_eq!(args.settings, None);
        assert_eq!(args.log_file, None);
    }

    #[test]
    fn test_script_path_populates_script_field() {
        let args = Args::parse_from(["chatwin", "session.jsonl"]);
        assert_eq!(args.script, Some(PathBuf::from("session.jsonl")));
    }

    #[test]
    fn test_path_flags() {
        let args = Args::parse_from([
            "chatwin",
            "--config",
            "c.toml",
            "--settings",
            "s.toml",
            "--log-file",
            "out.log",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        assert_eq!(args.settings, Some(PathBuf::from("s.toml")));
        assert_eq!(args.log_file, Some(PathBuf::from("out.log")));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let result = Args::try_parse_from(["chatwin", "--follow"]);
        assert!(result.is_err());
    }

    #[test]
    fn replay_reports_one_snapshot_per_step() {
        let steps = parse_script(
            r#"{"op": "load", "turns": 25}
{"op": "click", "target": "show_older"}"#,
        )
        .expect("valid script");
        let locator = Locator::chat_defaults().expect("default patterns");
        let snapshots = replay(locator, MemoryStore::new(), &steps).expect("replays");
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].hidden_top, 15);
        assert_eq!(snapshots[1].hidden_top, 5);
    }
}
