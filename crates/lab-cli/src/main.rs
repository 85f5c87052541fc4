use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use lab_exp::{run_sweep, Configuration, GitCli, SweepOptions, SweepReport};
use tracing::{error, info};

use progress::ConsoleProgress;

mod progress;
mod telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "lab-assistant",
    about = "Run an executable once per combination of a YAML parameter sweep"
)]
struct Cli {
    /// YAML configuration describing the executable and its parameters.
    config: Option<PathBuf>,
    /// Directory receiving `<sweep name>/<timestamp>` output trees.
    #[arg(short = 'l', long, env = "LAB_ASSISTANT_LOG_DIR", default_value = ".")]
    log_dir: PathBuf,
    /// Milliseconds between completion checks of a running child.
    #[arg(long, default_value_t = 1000, hide = true)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let Some(config) = cli.config.as_deref() else {
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::FAILURE;
    };

    match run(config, &cli) {
        Ok(report) => {
            info!(
                root = %report.root.display(),
                runs = report.runs.len(),
                failed = report.failed(),
                "all runs finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &Path, cli: &Cli) -> Result<SweepReport, Box<dyn Error>> {
    let config = Configuration::load(config_path)?;
    let options = SweepOptions {
        log_root: cli.log_dir.clone(),
        poll_interval: Duration::from_millis(cli.poll_ms.max(1)),
        stamp: None,
    };
    let mut progress = ConsoleProgress::new();
    let report = run_sweep(&config, &options, &GitCli, &mut progress)?;
    Ok(report)
}
