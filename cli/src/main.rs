mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{Local, Timelike};
use clap::Parser;
use taskflow_core::{
    parse_args, AuthService, Backend, Config, Credentials, Notice, Operation, ProfilePatch,
    Session, SignUp, Task, TaskFilter, TaskPriority, TaskStatus, TASK_KEYS,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const LOG_ENV: &str = "TASKFLOW_LOG";
const RECENT_LIMIT: usize = 5;

#[derive(Parser)]
#[command(name = "taskflow")]
#[command(about = "Tasks and profile, from your terminal", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Directory holding config.toml and local data (default: ~/.taskflow)
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        email: String,
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in with email and password
    Signin { email: String, password: String },
    /// Sign out and forget the session
    Signout,
    /// Show who is signed in
    Whoami,
    /// Add a task (usage: add Buy milk pri:low desc:"2 litres" status:ip)
    Add {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List tasks, newest first
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<TaskStatus>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<TaskPriority>,
        /// Group by status
        #[arg(short, long)]
        grouped: bool,
    },
    /// Change a task (usage: update <id> [new title words] [key:value ...])
    Update {
        id: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Move a task to its next status
    Advance { id: String },
    /// Delete a task
    Delete { id: String },
    /// Dashboard: counts, completion and recent tasks
    Stats,
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(clap::Subcommand)]
enum ProfileCommands {
    Show,
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
}

fn parse_status(s: &str) -> std::result::Result<TaskStatus, String> {
    s.parse().map_err(|e: taskflow_core::FieldError| e.message)
}

fn parse_priority(s: &str) -> std::result::Result<TaskPriority, String> {
    s.parse().map_err(|e: taskflow_core::FieldError| e.message)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Prints the notice for `result` and tells the caller whether it failed.
fn report<T>(operation: Operation, result: &taskflow_core::Result<T>) -> bool {
    let notice = Notice::for_result(operation, result);
    let field_errors = match result {
        Err(err) => err.field_errors(),
        Ok(_) => &[],
    };
    output::print_notice(&notice, field_errors);
    notice.is_error()
}

/// Finds the cached task whose id starts with `prefix` (dashes optional).
fn resolve_id(tasks: &[Task], prefix: &str) -> Result<Uuid> {
    let needle = prefix.trim().to_lowercase().replace('-', "");
    if needle.is_empty() {
        bail!("Task id is required.");
    }
    let matches: Vec<Uuid> = tasks
        .iter()
        .map(|t| t.id)
        .filter(|id| id.simple().to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No task matches '{}'.", prefix),
        _ => bail!("'{}' matches {} tasks; use more characters.", prefix, matches.len()),
    }
}

fn greeting(hour: u32) -> &'static str {
    match hour {
        0..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}

async fn open_session(backend: Arc<dyn Backend>) -> Result<Option<Session<dyn Backend>>> {
    match Session::start(backend).await {
        Ok(session) => Ok(Some(session)),
        Err(err) if err.kind() == taskflow_core::ErrorKind::Auth => {
            eprintln!("✗ {}", err);
            eprintln!("  Run `taskflow signin <email> <password>` first.");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Loads the task cache, printing the failure notice if it cannot.
async fn load_tasks(session: &mut Session<dyn Backend>) -> bool {
    let result = session.tasks_mut().list().await.map(|_| ());
    if result.is_err() {
        report(Operation::FetchTasks, &result);
        return false;
    }
    true
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.home)?;
    let backend = config.connect()?;
    let failed = run(cli.command, backend).await?;
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

async fn run(command: Commands, backend: Arc<dyn Backend>) -> Result<bool> {
    match command {
        Commands::Signup { email, password, name } => {
            let auth = AuthService::new(backend);
            let result = auth.sign_up(&SignUp::new(email, password, name)).await;
            Ok(report(Operation::SignUp, &result))
        }
        Commands::Signin { email, password } => {
            let auth = AuthService::new(backend.clone());
            let result = auth.sign_in(&Credentials::new(email, password)).await;
            if report(Operation::SignIn, &result) {
                return Ok(true);
            }
            if let Some(mut session) = open_session(backend).await? {
                // Greeting only; a missing profile is fine here.
                if session.profile_mut().fetch().await.is_ok() {
                    println!("Hello, {}!", session.profile().greeting_name());
                }
            }
            Ok(false)
        }
        Commands::Signout => {
            let Some(session) = open_session(backend).await? else {
                return Ok(false);
            };
            session.sign_out().await?;
            println!("✓ Signed out");
            Ok(false)
        }
        Commands::Whoami => {
            let auth = AuthService::new(backend);
            match auth.current_user().await? {
                Some(user) => {
                    println!("{} ({})", user.email.as_deref().unwrap_or("-"), user.id);
                }
                None => println!("Not signed in."),
            }
            Ok(false)
        }
        Commands::Add { args } => {
            let Some(mut session) = open_session(backend).await? else {
                return Ok(true);
            };
            let input = parse_args(&args, &TASK_KEYS).and_then(|parsed| parsed.into_new_task());
            let result = match input {
                Ok(task) => session.tasks_mut().create(task).await,
                Err(err) => Err(err),
            };
            let failed = report(Operation::CreateTask, &result);
            if let Ok(task) = result {
                println!("{}", output::task_table([&task]));
            }
            Ok(failed)
        }
        Commands::List { search, status, priority, grouped } => {
            let Some(mut session) = open_session(backend).await? else {
                return Ok(true);
            };
            if !load_tasks(&mut session).await {
                return Ok(true);
            }
            let filter = TaskFilter { search, status, priority };
            let store = session.tasks();
            if grouped {
                let groups = store.groups(&filter);
                if groups.is_empty() {
                    println!("{}", empty_message(&filter));
                }
                for (status, tasks) in groups.iter().filter(|(_, tasks)| !tasks.is_empty()) {
                    println!("{} ({})", status.label(), tasks.len());
                    println!("{}", output::task_table(tasks));
                }
            } else {
                let tasks = store.filtered(&filter);
                if tasks.is_empty() {
                    println!("{}", empty_message(&filter));
                } else {
                    println!("{}", output::task_table(tasks));
                }
            }
            Ok(false)
        }
        Commands::Update { id, args } => {
            let Some(mut session) = open_session(backend).await? else {
                return Ok(true);
            };
            if !load_tasks(&mut session).await {
                return Ok(true);
            }
            let id = resolve_id(session.tasks().tasks(), &id)?;
            let patch = parse_args(&args, &TASK_KEYS).and_then(|parsed| parsed.into_patch());
            let result = match patch {
                Ok(patch) => session.tasks_mut().update(id, patch).await,
                Err(err) => Err(err),
            };
            let failed = report(Operation::UpdateTask, &result);
            if let Ok(task) = result {
                println!("{}", output::task_table([&task]));
            }
            Ok(failed)
        }
        Commands::Advance { id } => {
            let Some(mut session) = open_session(backend).await? else {
                return Ok(true);
            };
            if !load_tasks(&mut session).await {
                return Ok(true);
            }
            let id = resolve_id(session.tasks().tasks(), &id)?;
            let result = session.tasks_mut().advance_status(id).await;
            let failed = report(Operation::UpdateTask, &result);
            if let Ok(task) = result {
                println!("{}", output::task_table([&task]));
            }
            Ok(failed)
        }
        Commands::Delete { id } => {
            let Some(mut session) = open_session(backend).await? else {
                return Ok(true);
            };
            if !load_tasks(&mut session).await {
                return Ok(true);
            }
            let id = resolve_id(session.tasks().tasks(), &id)?;
            let result = session.tasks_mut().delete(id).await;
            Ok(report(Operation::DeleteTask, &result))
        }
        Commands::Stats => {
            let Some(mut session) = open_session(backend).await? else {
                return Ok(true);
            };
            if let Err(err) = session.refresh().await {
                report::<()>(Operation::FetchTasks, &Err(err));
                return Ok(true);
            }
            println!(
                "{}, {}!",
                greeting(Local::now().hour()),
                session.profile().greeting_name()
            );
            println!("{}", output::stats_table(&session.tasks().stats()));
            let recent = session.tasks().recent(RECENT_LIMIT);
            if recent.is_empty() {
                println!("No tasks yet. Create one with `taskflow add <title>`.");
            } else {
                println!("Recent tasks");
                println!("{}", output::task_table(recent));
            }
            Ok(false)
        }
        Commands::Profile { command } => {
            let Some(mut session) = open_session(backend).await? else {
                return Ok(true);
            };
            match command {
                ProfileCommands::Show => {
                    let result = session.profile_mut().fetch().await.map(|_| ());
                    if result.is_err() {
                        return Ok(report(Operation::FetchProfile, &result));
                    }
                    let email = session.user().email.clone();
                    let initials = session.profile().initials(email.as_deref());
                    println!(
                        "{}",
                        output::profile_table(session.profile().profile(), email.as_deref(), &initials)
                    );
                    Ok(false)
                }
                ProfileCommands::Set { name, avatar } => {
                    let patch = ProfilePatch { full_name: name, avatar_url: avatar };
                    let result = session.profile_mut().update(patch).await;
                    Ok(report(Operation::UpdateProfile, &result))
                }
            }
        }
    }
}

fn empty_message(filter: &TaskFilter) -> &'static str {
    if filter.is_active() {
        "No tasks match your filters."
    } else {
        "No tasks yet. Create one with `taskflow add <title>`."
    }
}
