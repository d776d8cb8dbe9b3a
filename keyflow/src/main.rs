//! `keyflow` command line.
//!
//! Runs documents interactively in blocking mode and offers static checks
//! and link resolution for authoring.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use keyflow::check::check_document;
use keyflow::core::collab::{Loader, LoadError};
use keyflow::core::error::DispatchError;
use keyflow::core::link::Location;
use keyflow::core::session::{AuthContext, Session};
use keyflow::core::types::{ErrorKind, Mode};
use keyflow::engine::Engine;
use keyflow::exit_codes;
use keyflow::io::config::{CONFIG_FILE, EngineConfig, load_config};
use keyflow::io::detached::{Detached, NoInput, Unsupported};
use keyflow::io::dialogs::ConsoleDialogs;
use keyflow::io::init::{InitOptions, init_project};
use keyflow::io::services::Services;
use keyflow::io::session_store::{load_session, write_session};
use keyflow::io::terminal::{StdinPrompter, TerminalDisplay};
use keyflow::links;
use keyflow::logging;
use keyflow::runtime::{RunStop, run_session};

#[derive(Parser)]
#[command(
    name = "keyflow",
    version,
    about = "Declarative menu and navigation runtime"
)]
struct Cli {
    /// Project directory containing `keyflow.toml`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `keyflow.toml` and a demo document.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Run a document interactively.
    Run {
        /// Document path, e.g. `/main`.
        path: String,
        /// Load the session from and save it back to this file.
        #[arg(long)]
        session: Option<PathBuf>,
    },
    /// Classify every command of a document without running it.
    Check {
        path: String,
    },
    /// Print where a link expression leads from a location.
    Link {
        expr: String,
        /// Starting location as `path.block`.
        #[arg(long)]
        from: String,
    },
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Run { path, session } => cmd_run(&cli.root, &path, session.as_deref()),
        Command::Check { path } => cmd_check(&cli.root, &path),
        Command::Link { expr, from } => cmd_link(&cli.root, &expr, &from),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<DispatchError>())
        .map(DispatchError::kind);
    match kind {
        Some(ErrorKind::NotFound) => exit_codes::NOT_FOUND,
        Some(ErrorKind::PermissionDenied) => exit_codes::FORBIDDEN,
        _ => exit_codes::INVALID,
    }
}

fn load_project(root: &Path) -> Result<(EngineConfig, Services)> {
    let config = load_config(&root.join(CONFIG_FILE))?.resolve_paths(root);
    let services = Services::from_config(&config, root)?;
    Ok((config, services))
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_project(root, &InitOptions { force })?;
    println!("initialized {}", paths.config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, path: &str, session_file: Option<&Path>) -> Result<i32> {
    let (config, services) = load_project(root)?;
    let engine = Engine::new(&config);

    let saved = match session_file {
        Some(file) => load_session(file, Mode::Blocking)?,
        None => None,
    };
    let resume = saved
        .as_ref()
        .is_some_and(|session| session.current_location().is_some());
    let mut session = saved.unwrap_or_else(|| Session::new(Mode::Blocking));
    session.set_auth(AuthContext {
        user: std::env::var("USER").ok(),
        ..AuthContext::with_roles(config.roles.iter().cloned())
    });

    let display = TerminalDisplay::stdout();
    let prompter = StdinPrompter::stdin();
    let dialogs = ConsoleDialogs::new(&prompter, &display);
    let collab = services.collab(&display, &prompter, &dialogs);

    let outcome = run_session(
        &engine,
        &mut session,
        (!resume).then_some(path),
        &collab,
        config.max_steps,
        |step| debug!(at = %step.location, key = step.key, ok = step.result.is_ok(), "step"),
    );
    if let Some(file) = session_file {
        write_session(file, &session)?;
    }
    let outcome = outcome?;
    Ok(match outcome.stop {
        RunStop::Finished => exit_codes::OK,
        RunStop::Aborted => exit_codes::ABORTED,
        RunStop::StepLimit { max_steps } => {
            eprintln!("stopped after {max_steps} steps");
            exit_codes::OK
        }
    })
}

fn cmd_check(root: &Path, path: &str) -> Result<i32> {
    let (_, services) = load_project(root)?;
    let doc = match services.loader.load(path) {
        Ok(doc) => doc,
        Err(LoadError::NotFound(path)) => {
            eprintln!("document '{path}' not found");
            return Ok(exit_codes::NOT_FOUND);
        }
        Err(err) => return Err(err).context("load document"),
    };
    let problems = check_document(&doc);
    if problems.is_empty() {
        println!("{path}: ok");
        return Ok(exit_codes::OK);
    }
    for problem in &problems {
        println!("{path}: {problem}");
    }
    Ok(exit_codes::INVALID)
}

fn cmd_link(root: &Path, expr: &str, from: &str) -> Result<i32> {
    let (config, services) = load_project(root)?;
    let from: Location = from.parse().context("parse --from")?;
    let mut session = Session::new(Mode::NonBlocking);
    session.set_auth(AuthContext::with_roles(config.roles.iter().cloned()));
    session.relocate(from, "link");

    let dialogs = Unsupported("dialogs");
    let collab = services.collab(&Detached, &NoInput, &dialogs);
    let target = links::target(expr, &session, &collab, &config.default_block)?;
    println!("{target}");
    Ok(exit_codes::OK)
}
