//! Trackdown CLI - file-based epic/issue/task/PR tracking.

use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process;

use trackdown::cli::{Cli, Commands, CreateCommands, IndexCommands, PrCommands};
use trackdown::commands::{self, ListArgs, UpdateArgs};
use trackdown::config::ResolveContext;
use trackdown::store::Store;

fn main() {
    init_logging();
    let cli = Cli::parse();
    let human = cli.human_readable;

    let project_dir = resolve_project_dir(cli.project_dir, human);
    let ctx = ResolveContext::from_process_env(project_dir, cli.tasks_root.clone());

    match run_command(cli.command, ctx) {
        Ok(CommandOutcome { value, ok }) => {
            print_value(&value, human);
            if !ok {
                process::exit(1);
            }
        }
        Err(e) => {
            if human {
                eprintln!("Error: {}", e);
            } else {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
            }
            process::exit(1);
        }
    }
}

/// Quiet by default; RUST_LOG opts into diagnostics on stderr.
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

struct CommandOutcome {
    value: serde_json::Value,
    /// False turns into a nonzero exit (e.g. an unhealthy doctor report)
    ok: bool,
}

impl CommandOutcome {
    fn ok(value: serde_json::Value) -> Self {
        Self { value, ok: true }
    }
}

/// Resolve the project directory: -C/--project-dir wins, then the current
/// working directory. An explicit path must exist; it is used literally.
fn resolve_project_dir(explicit: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit {
        Some(path) => {
            if !path.exists() {
                if human {
                    eprintln!("Error: project dir does not exist: {}", path.display());
                } else {
                    eprintln!(
                        "{}",
                        serde_json::json!({
                            "error": format!("project dir does not exist: {}", path.display())
                        })
                    );
                }
                process::exit(1);
            }
            path
        }
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn run_command(command: Commands, ctx: ResolveContext) -> trackdown::Result<CommandOutcome> {
    match command {
        Commands::Init { root } => Ok(CommandOutcome::ok(commands::init(ctx, root)?)),

        Commands::Paths => Ok(CommandOutcome::ok(commands::paths(ctx)?)),

        Commands::Create { command } => {
            let store = Store::open(ctx)?;
            let value = match command {
                CreateCommands::Epic { title, common } => {
                    let opts = commands::create_options(
                        common.description,
                        common.priority,
                        common.assignee,
                        common.tag,
                        common.estimate,
                    )?;
                    commands::create_epic(&store, &title, &opts)?
                }
                CreateCommands::Issue {
                    title,
                    epic,
                    common,
                } => {
                    let opts = commands::create_options(
                        common.description,
                        common.priority,
                        common.assignee,
                        common.tag,
                        common.estimate,
                    )?;
                    commands::create_issue(&store, &title, &epic, &opts)?
                }
                CreateCommands::Task {
                    title,
                    issue,
                    parent,
                    common,
                } => {
                    let opts = commands::create_options(
                        common.description,
                        common.priority,
                        common.assignee,
                        common.tag,
                        common.estimate,
                    )?;
                    commands::create_task(&store, &title, &issue, parent.as_deref(), &opts)?
                }
                CreateCommands::Pr {
                    title,
                    issue,
                    branch,
                    common,
                } => {
                    let opts = commands::create_options(
                        common.description,
                        common.priority,
                        common.assignee,
                        common.tag,
                        common.estimate,
                    )?;
                    commands::create_pr(&store, &title, &issue, branch, &opts)?
                }
            };
            Ok(CommandOutcome::ok(value))
        }

        Commands::Show { id } => {
            let store = Store::open(ctx)?;
            Ok(CommandOutcome::ok(commands::show(&store, &id)?))
        }

        Commands::List {
            kind,
            status,
            priority,
            assignee,
            tag,
            search,
            sort,
            reverse,
        } => {
            let store = Store::open(ctx)?;
            let args = ListArgs {
                kind,
                status,
                priority,
                assignee,
                tags: tag,
                search,
                sort,
                reverse,
            };
            Ok(CommandOutcome::ok(commands::list(&store, args)?))
        }

        Commands::Update {
            id,
            title,
            description,
            status,
            priority,
            assignee,
            tag,
            estimate,
            actual,
        } => {
            let store = Store::open(ctx)?;
            let args = UpdateArgs {
                title,
                description,
                status,
                priority,
                assignee,
                tags: tag,
                estimate,
                actual,
            };
            Ok(CommandOutcome::ok(commands::update(&store, &id, args)?))
        }

        Commands::Delete { id } => {
            let store = Store::open(ctx)?;
            Ok(CommandOutcome::ok(commands::delete(&store, &id)?))
        }

        Commands::Hierarchy { issue_id } => {
            let store = Store::open(ctx)?;
            Ok(CommandOutcome::ok(commands::hierarchy(&store, &issue_id)?))
        }

        Commands::Pr { command } => {
            let store = Store::open(ctx)?;
            match command {
                PrCommands::Transition { id, to, force } => Ok(CommandOutcome::ok(
                    commands::pr_transition(&store, &id, &to, force)?,
                )),
            }
        }

        Commands::Index { command } => {
            let store = Store::open(ctx)?;
            match command {
                IndexCommands::Rebuild => {
                    Ok(CommandOutcome::ok(commands::index_rebuild(&store)?))
                }
                IndexCommands::Validate => {
                    let value = commands::index_validate(&store)?;
                    let ok = value["healthy"].as_bool().unwrap_or(false);
                    Ok(CommandOutcome { value, ok })
                }
            }
        }

        Commands::Doctor => {
            // The doctor reports a broken layout instead of refusing to open
            let store = Store::open_unchecked(ctx)?;
            let value = commands::doctor(&store)?;
            let ok = value["healthy"].as_bool().unwrap_or(false);
            Ok(CommandOutcome { value, ok })
        }
    }
}

fn print_value(value: &serde_json::Value, human: bool) {
    if human {
        match serde_yaml::to_string(value) {
            Ok(text) => print!("{}", text),
            Err(_) => println!("{}", value),
        }
    } else {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        }
    }
}
