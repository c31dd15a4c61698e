use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use yt_optimize::config::{self, LoadOptions};
use yt_optimize::prefs::Preferences;
use yt_optimize::storage::{self, SqliteStore};

const HELP: &str = "yt-optimize - quality, speed, web fullscreen, feed filtering and hotkeys for YouTube.

  --version, -V        Show version and exit
  --help,    -h        Show this help message
  --show               Print every preference with its effective value
  --set KEY=VALUE      Validate and store a preference
  --reset KEY          Remove a stored preference so its default applies
  --store PATH         Preference database (default: config dir/yt-optimize/prefs.db)
  --config PATH        YAML config file (default: config dir/yt-optimize/config.yaml)

Set YT_OPTIMIZE_LOG (e.g. debug) to control log output.";

#[derive(Debug)]
enum Command {
    Show,
    Set { key: String, value: String },
    Reset(String),
}

#[derive(Debug, Default)]
struct Cli {
    commands: Vec<Command>,
    store: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn main() {
    yt_optimize::logging::init();

    let cli = match handle_cli_flags() {
        Ok(Some(cli)) => cli,
        Ok(None) => return,
        Err(err) => {
            eprintln!("error: {err:?}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Handles the informational flags directly. Returns the commands left to run
/// against the store, or `None` when there is nothing more to do.
fn handle_cli_flags() -> Result<Option<Cli>> {
    let mut cli = Cli::default();
    let mut saw_flag = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("yt-optimize {}", yt_optimize::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                saw_flag = true;
            }
            "--show" => cli.commands.push(Command::Show),
            "--set" => {
                let pair = args.next().context("--set needs KEY=VALUE")?;
                let Some((key, value)) = pair.split_once('=') else {
                    bail!("--set expects KEY=VALUE, got {pair:?}");
                };
                cli.commands.push(Command::Set {
                    key: key.trim().to_string(),
                    value: value.to_string(),
                });
            }
            "--reset" => {
                let key = args.next().context("--reset needs KEY")?;
                cli.commands.push(Command::Reset(key));
            }
            "--store" => {
                cli.store = Some(args.next().context("--store needs PATH")?.into());
            }
            "--config" => {
                cli.config = Some(args.next().context("--config needs PATH")?.into());
            }
            other => bail!("unknown argument {other:?}; see --help"),
        }
    }

    if cli.commands.is_empty() {
        if !saw_flag {
            println!("{HELP}");
        }
        return Ok(None);
    }
    Ok(Some(cli))
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load(LoadOptions {
        config_file: cli.config,
        env_prefix: None,
    })?;
    let store = SqliteStore::open(storage::Options { path: cli.store })?;
    let prefs = Preferences::new(Arc::new(store), &config);

    for command in cli.commands {
        match command {
            Command::Show => {
                for (key, value) in prefs.effective() {
                    println!("{key}={value}");
                }
                println!("# quality policy: {}", prefs.quality_policy());
            }
            Command::Set { key, value } => {
                prefs
                    .apply_raw(&key, &value)
                    .with_context(|| format!("set {key}"))?;
                tracing::info!(key = key.as_str(), "preference stored");
            }
            Command::Reset(key) => {
                prefs.reset(&key).with_context(|| format!("reset {key}"))?;
                tracing::info!(key = key.as_str(), "preference reset");
            }
        }
    }
    Ok(())
}
