mod catalog;
mod config;
mod ledger;
mod logging;
mod model;
mod report;
mod scoring;
mod session;

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing::{error, info};

use crate::catalog::TrialCatalog;
use crate::config::{ConfigError, ExperimentConfig};
use crate::model::{Category, ExperimentMode, InvalidParticipantId, SessionKey};
use crate::report::{ReportError, build_summary, write_reports};
use crate::session::{
    ConsolePresenter, PauseSignal, SessionController, SessionError, SessionPlan, SessionState,
    SessionStore, outcome_channel,
};

#[derive(Debug, Parser)]
#[command(
    name = "artifact-rater",
    version,
    about = "Run, resume and score EEG/MEG artifact-rating sessions"
)]
struct Cli {
    /// JSON file with experiment defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, short, global = true)]
    verbose: bool,
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    session_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    results_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Channels,
    Components,
}

impl From<ModeArg> for ExperimentMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Channels => ExperimentMode::Channels,
            ModeArg::Components => ExperimentMode::Components,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CategoryArg {
    Eeg,
    Mag,
    Grad,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Eeg => Category::Eeg,
            CategoryArg::Mag => Category::Mag,
            CategoryArg::Grad => Category::Grad,
        }
    }
}

#[derive(Debug, Args)]
struct SessionArgs {
    #[arg(long)]
    participant: String,
    #[arg(long)]
    session: u32,
    #[arg(long, value_enum, default_value = "channels")]
    mode: ModeArg,
}

#[derive(Debug, Args)]
struct PlanArgs {
    /// Comma-separated; all categories when omitted.
    #[arg(long, value_enum, value_delimiter = ',')]
    categories: Vec<CategoryArg>,
    #[arg(long)]
    trials: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Self-reported experience, 1 (none) to 4 (expert).
    #[arg(long)]
    experience_level: Option<u8>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Draw and store the trial set of a session without running it.
    Init {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Present the remaining trials on the terminal.
    Run {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        plan: PlanArgs,
        /// Show per-trial scores after each response.
        #[arg(long)]
        feedback: bool,
    },
    /// Show progress of a stored session.
    Status {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Write summary.json and report.txt for a stored session.
    Report {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Participant(#[from] InvalidParticipantId),
    #[error("no session definition found for {0}; run `init` or `run` first")]
    NoSession(String),
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(&cli)?;
    let store = SessionStore::new(&config.session_dir, &config.results_dir);

    match &cli.command {
        Command::Init { session, plan } => {
            let mut controller = SessionController::new(store, session_key(session)?);
            controller.prepare(&session_plan(plan, &config), || {
                TrialCatalog::discover(&config.catalog_dir)
            })?;
            print_status(&controller);
        }
        Command::Run {
            session,
            plan,
            feedback,
        } => {
            let key = session_key(session)?;
            let mut controller = SessionController::new(store.clone(), key)
                .with_feedback(*feedback || config.feedback);
            controller.prepare(&session_plan(plan, &config), || {
                TrialCatalog::discover(&config.catalog_dir)
            })?;

            let (tx, rx) = outcome_channel();
            let pause = PauseSignal::new();
            let stdin = io::stdin();
            let mut presenter =
                ConsolePresenter::new(stdin.lock(), io::stdout(), tx, pause.clone());
            controller.run(&mut presenter, &rx, &pause)?;

            match controller.state() {
                SessionState::Completed => {
                    let dir = write_session_report(&controller, &store, &config)?;
                    info!("session complete; report written to {}", dir.display());
                }
                _ => info!(
                    "session paused with {} trials remaining; run again to resume",
                    controller.remaining().len()
                ),
            }
        }
        Command::Status { session } => {
            let controller = open_existing(store, session_key(session)?)?;
            print_status(&controller);
        }
        Command::Report { session } => {
            let controller = open_existing(store.clone(), session_key(session)?)?;
            let dir = write_session_report(&controller, &store, &config)?;
            info!("report written to {}", dir.display());
        }
    }
    Ok(())
}

/// Defaults, then the `--config` file, then command-line directories.
fn resolve_config(cli: &Cli) -> Result<ExperimentConfig, CliError> {
    let mut config = ExperimentConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.catalog_dir {
        config.catalog_dir = dir.clone();
    }
    if let Some(dir) = &cli.session_dir {
        config.session_dir = dir.clone();
    }
    if let Some(dir) = &cli.results_dir {
        config.results_dir = dir.clone();
    }
    Ok(config)
}

fn session_key(args: &SessionArgs) -> Result<SessionKey, CliError> {
    Ok(SessionKey::new(
        &args.participant,
        args.session,
        args.mode.into(),
    )?)
}

fn session_plan(args: &PlanArgs, config: &ExperimentConfig) -> SessionPlan {
    SessionPlan {
        categories: args
            .categories
            .iter()
            .map(|c| Category::from(*c))
            .collect::<BTreeSet<_>>(),
        count: args.trials.unwrap_or(config.trials_per_session),
        seed: args.seed,
        experience_level: args.experience_level,
    }
}

fn open_existing(store: SessionStore, key: SessionKey) -> Result<SessionController, CliError> {
    let stem = key.file_stem();
    let mut controller = SessionController::new(store, key);
    if !controller.open_existing()? {
        return Err(CliError::NoSession(stem));
    }
    Ok(controller)
}

fn write_session_report(
    controller: &SessionController,
    store: &SessionStore,
    config: &ExperimentConfig,
) -> Result<PathBuf, CliError> {
    let Some(definition) = controller.definition() else {
        return Err(CliError::NoSession(controller.key().file_stem()));
    };
    let skipped = controller
        .ledger()
        .map(|l| l.corrupt_rows().len())
        .unwrap_or(0);
    let summary = build_summary(
        definition,
        &controller.completed_outcomes(),
        skipped,
        config.learning_curve_window,
    );
    let dir = store.report_dir(controller.key());
    write_reports(&dir, &summary)?;
    Ok(dir)
}

fn print_status(controller: &SessionController) {
    println!("{}", status_line(controller));
}

fn status_line(controller: &SessionController) -> String {
    let total = controller.definition().map(|d| d.trials.len()).unwrap_or(0);
    let remaining = controller.remaining();
    let done = total - remaining.len();
    let mut line = format!(
        "session {}: {}/{} trials scored",
        controller.key().file_stem(),
        done,
        total
    );
    if remaining.is_empty() {
        line.push_str(", complete");
    } else {
        let next: Vec<String> = remaining.iter().map(|i| i.to_string()).collect();
        line.push_str(&format!(", remaining {}", next.join(", ")));
    }
    if done > 0 {
        line.push_str(&format!(
            ", accuracy {:.3}",
            controller.aggregate().overall().accuracy()
        ));
    }
    line
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
