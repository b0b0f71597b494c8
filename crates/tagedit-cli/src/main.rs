use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tagedit_core::config::{build_runner, resolve_config, TageditConfig};
use tagedit_core::runner::ProcessRunner;
use tagedit_core::{SessionError, TagBackend, TagRow, TagSession, Tmsu};
use tracing_subscriber::EnvFilter;

mod render;
mod shell;

type Session = TagSession<Tmsu<ProcessRunner>>;

/// Exit status of `set-value` when tmsu dropped the old value but did not
/// accept the new one.
const PARTIAL_FAILURE_EXIT: i32 = 3;

#[derive(Parser)]
#[command(name = "tagedit", version, about = "View and edit the tmsu tags of a file")]
struct Cli {
    /// Command used to run tmsu (defaults to `tmsu` on PATH)
    #[arg(long, global = true, value_name = "CMD")]
    tmsu: Option<String>,
    /// tmsu database to use
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<String>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Log tmsu commands to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the tmsu database in use
    Info,
    /// List every known tag and whether the file carries it
    List { file: PathBuf },
    /// Tag the file with TAG, or untag it if already tagged
    Toggle { file: PathBuf, tag: String },
    /// Tag the file, creating the tag if it is new
    Add {
        file: PathBuf,
        name: String,
        #[arg(long)]
        value: Option<String>,
    },
    /// Rename a tag in the whole database
    Rename {
        file: PathBuf,
        old: String,
        new: String,
    },
    /// Change the value TAG carries on the file
    SetValue {
        file: PathBuf,
        tag: String,
        value: String,
    },
    /// Delete a tag from the whole database
    Delete {
        file: PathBuf,
        tag: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// List values used with TAG (or all values)
    Values { tag: Option<String> },
    /// Edit tags interactively, one command per line
    Edit { file: PathBuf },
    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Command::Info => {
            let backend = backend(&cli, Path::new("."))?;
            let Some(info) = backend.info().context("query tmsu info")? else {
                bail!("No tmsu database is found.");
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&render::info_json(&info))?);
            } else {
                print!("{}", render::info_text(&info));
            }
        }
        Command::List { file } => {
            let session = open_session(&cli, file)?;
            print_rows(&cli, &session)?;
        }
        Command::Toggle { file, tag } => {
            let mut session = open_session(&cli, file)?;
            let row = session.toggle(tag)?.clone();
            print_change(&cli, &session, &row)?;
        }
        Command::Add { file, name, value } => {
            let mut session = open_session(&cli, file)?;
            let row = session.add(name, value.as_deref().unwrap_or_default())?.clone();
            print_change(&cli, &session, &row)?;
        }
        Command::Rename { file, old, new } => {
            let mut session = open_session(&cli, file)?;
            let row = session.edit_name(old, new)?.clone();
            print_change(&cli, &session, &row)?;
        }
        Command::SetValue { file, tag, value } => {
            let mut session = open_session(&cli, file)?;
            let row = match session.edit_value(tag, value) {
                Ok(row) => row.clone(),
                Err(err) if err.is_partial() => exit_partial(&err, file),
                Err(err) => return Err(err.into()),
            };
            print_change(&cli, &session, &row)?;
        }
        Command::Delete { file, tag, yes } => {
            if !yes {
                bail!(
                    "Deleting {:?} removes it from every file in the database; pass --yes to confirm",
                    tag
                );
            }
            let mut session = open_session(&cli, file)?;
            let row = session.delete(tag)?;
            if cli.json {
                let mut payload = render::rows_json(session.path(), session.rows());
                payload["deleted"] = serde_json::to_value(&row)?;
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("deleted {}", row.name);
                print!("{}", render::rows_text(session.rows()));
            }
        }
        Command::Values { tag } => {
            let backend = backend(&cli, Path::new("."))?;
            let values = backend
                .list_values(tag.as_deref())
                .context("list tag values")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else {
                for value in values {
                    println!("{}", value);
                }
            }
        }
        Command::Edit { file } => {
            let mut session = open_session(&cli, file)?;
            let stdin = io::stdin();
            let prompt = stdin.is_terminal();
            let mut stdout = io::stdout();
            shell::run(&mut session, stdin.lock(), &mut stdout, prompt)?;
        }
        Command::Version => {
            println!("tagedit {}", tagedit_core::version());
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn backend(cli: &Cli, start: &Path) -> Result<Tmsu<ProcessRunner>> {
    let explicit = TageditConfig {
        tmsu_command: cli.tmsu.clone(),
        database: cli.database.clone(),
    };
    let config = resolve_config(start, explicit, None).context("load configuration")?;
    let runner = build_runner(&config)?;
    Ok(Tmsu::new(runner))
}

fn open_session(cli: &Cli, file: &Path) -> Result<Session> {
    if !file.exists() {
        bail!("{} does not exist", file.display());
    }
    let start = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let backend = backend(cli, start)?;
    let session = TagSession::open(backend, file)
        .with_context(|| format!("load tags of {}", file.display()))?;
    tracing::debug!(
        file = %file.display(),
        rows = session.rows().len(),
        "session opened"
    );
    Ok(session)
}

fn exit_partial(err: &SessionError, file: &Path) -> ! {
    eprintln!("Error: {}", err);
    eprintln!(
        "hint: run `tagedit list {}` to see the tags tmsu kept",
        file.display()
    );
    std::process::exit(PARTIAL_FAILURE_EXIT);
}

fn print_rows(cli: &Cli, session: &Session) -> Result<()> {
    if cli.json {
        let payload = render::rows_json(session.path(), session.rows());
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print!("{}", render::rows_text(session.rows()));
    }
    Ok(())
}

fn print_change(cli: &Cli, session: &Session, row: &TagRow) -> Result<()> {
    if cli.json {
        let mut payload = render::rows_json(session.path(), session.rows());
        payload["row"] = serde_json::to_value(row)?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print!("{}", render::rows_text(session.rows()));
    }
    Ok(())
}
