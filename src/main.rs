//! # taskboard
//!
//! A command-line board for companies, projects and tasks that refuses to
//! double-book an assignee.
//!
//! ## Usage
//!
//! ```bash
//! taskboard company add Acme --address "1 Main St"
//! taskboard project add Acme Website --from 2024-01-01 --to 2024-01-31
//! taskboard assignee add Alice
//! taskboard task add Acme 1 "Landing page" -a Alice --from 2024-01-10T09:00 --to 2024-01-10T11:00
//! taskboard task list Acme 1
//! taskboard task summary Acme 1
//! taskboard check Acme 1 -a Alice --from 2024-01-10T10:00 --to 2024-01-10T12:00
//! ```
//!
//! ## Scheduling rules
//!
//! *   A task's deadline window must lie inside its project's date range
//!     (`[schedule] enforce_project_range`, on by default).
//! *   No assignee can be on two tasks of the same project whose windows
//!     overlap. Windows are inclusive: a task ending at 11:00 and one
//!     starting at 11:00 conflict.
//!
//! ## Data Storage
//!
//! The board is saved as JSON in your local data directory:
//! *   Linux: `~/.local/share/taskboard/board.json`
//! *   macOS: `~/Library/Application Support/taskboard/board.json`
//! *   Windows: `%APPDATA%\taskboard\board.json`
//!
//! Override it with `[storage] db_path` in the config file or the
//! `TASKBOARD_DB` environment variable. Set `TASKBOARD_LOG` (or `RUST_LOG`)
//! to control log output on stderr.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use taskboard::commands::*;
use taskboard::config::Config;
use taskboard::models::Stage;
use taskboard::storage::Store;
use taskboard::{Error, Result};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Task board with assignee scheduling-conflict checks", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "TASKBOARD_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage companies
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },
    /// Manage projects of a company
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage the assignee directory
    Assignee {
        #[command(subcommand)]
        command: AssigneeCommands,
    },
    /// Manage tasks of a project
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Check a proposed booking for conflicts without saving anything
    Check {
        company: String,
        project: u64,
        /// Assignee to book (repeatable)
        #[arg(short, long = "assignee", required = true)]
        assignees: Vec<String>,
        /// Window start, e.g. 2024-01-10T09:00
        #[arg(long)]
        from: String,
        /// Window end
        #[arg(long)]
        to: String,
        /// Task being edited, ignored during the check
        #[arg(short, long)]
        exclude: Option<u64>,
        /// Skip the project range check
        #[arg(long)]
        no_range: bool,
    },
    /// Reset the database (delete everything)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// Add a company (its name is its id)
    Add {
        name: String,
        #[arg(long)]
        address: Option<String>,
        /// Company user (repeatable)
        #[arg(short, long = "user")]
        users: Vec<String>,
    },
    /// List companies
    List,
    /// Edit a company
    Edit {
        id: String,
        #[arg(long)]
        address: Option<String>,
        /// Replaces the user list (repeatable)
        #[arg(short, long = "user")]
        users: Option<Vec<String>>,
    },
    /// Remove a company and its projects
    Remove { id: String },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Add a project
    Add {
        company: String,
        name: String,
        /// Range start, YYYY-MM-DD or YYYY-MM-DDTHH:MM
        #[arg(long)]
        from: String,
        /// Range end; a bare date covers the whole day
        #[arg(long)]
        to: String,
        #[arg(short, long = "user")]
        users: Vec<String>,
    },
    /// List projects of a company
    List { company: String },
    /// Edit a project
    Edit {
        company: String,
        id: u64,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long = "user")]
        users: Option<Vec<String>>,
    },
    /// Remove a project
    Remove { company: String, id: u64 },
}

#[derive(Subcommand)]
enum AssigneeCommands {
    /// Add an assignee
    Add { name: String },
    /// List assignees
    List,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task
    Add {
        company: String,
        project: u64,
        title: String,
        /// Assignee (repeatable, at least one)
        #[arg(short, long = "assignee", required = true)]
        assignees: Vec<String>,
        /// Deadline start, e.g. 2024-01-10T09:00
        #[arg(long)]
        from: String,
        /// Deadline end
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        customer: Option<String>,
        /// unstarted, begin, intermediate or completed
        #[arg(short, long)]
        stage: Option<Stage>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Edit a task
    Edit {
        company: String,
        project: u64,
        id: u64,
        #[arg(short, long)]
        title: Option<String>,
        /// Replaces the assignee list (repeatable)
        #[arg(short, long = "assignee")]
        assignees: Option<Vec<String>>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long)]
        customer: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// Star or unstar the task
        #[arg(short, long)]
        priority: Option<bool>,
    },
    /// Move a task to another stage
    Move {
        company: String,
        project: u64,
        id: u64,
        stage: Stage,
    },
    /// Remove a task
    Remove { company: String, project: u64, id: u64 },
    /// List tasks sorted by deadline
    List {
        company: String,
        project: u64,
        #[arg(short, long)]
        stage: Option<Stage>,
        #[arg(short, long)]
        assignee: Option<String>,
    },
    /// Print the task list again whenever it changes
    Watch { company: String, project: u64 },
    /// Show stage counts per assignee and the project's completion rate
    Summary { company: String, project: u64 },
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_env("TASKBOARD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

/// Exit status of `check` when the proposed booking conflicts.
const CONFLICT_EXIT: u8 = 2;

fn run(cli: Cli, config: &Config) -> Result<ExitCode> {
    let store = Store::open(&config.db_path);
    let outcome = match cli.command {
        Commands::Company { command } => match command {
            CompanyCommands::Add { name, address, users } => cmd_company_add(&store, name, address, users, false).map(|_| ()),
            CompanyCommands::List => cmd_company_list(&store),
            CompanyCommands::Edit { id, address, users } => cmd_company_edit(&store, id, address, users, false).map(|_| ()),
            CompanyCommands::Remove { id } => cmd_company_remove(&store, id, false),
        },
        Commands::Project { command } => match command {
            ProjectCommands::Add { company, name, from, to, users } => cmd_project_add(&store, company, name, from, to, users, false).map(|_| ()),
            ProjectCommands::List { company } => cmd_project_list(&store, config, company),
            ProjectCommands::Edit { company, id, name, from, to, users } => cmd_project_edit(&store, company, id, name, from, to, users, false).map(|_| ()),
            ProjectCommands::Remove { company, id } => cmd_project_remove(&store, company, id, false),
        },
        Commands::Assignee { command } => match command {
            AssigneeCommands::Add { name } => cmd_assignee_add(&store, name, false),
            AssigneeCommands::List => cmd_assignee_list(&store),
        },
        Commands::Task { command } => match command {
            TaskCommands::Add { company, project, title, assignees, from, to, customer, stage, color } => {
                cmd_task_add(&store, config, company, project, title, assignees, from, to, customer, stage, color, false).map(|_| ())
            }
            TaskCommands::Edit { company, project, id, title, assignees, from, to, customer, color, priority } => {
                cmd_task_edit(&store, config, company, project, id, title, assignees, from, to, customer, color, priority, false).map(|_| ())
            }
            TaskCommands::Move { company, project, id, stage } => cmd_task_move(&store, company, project, id, stage, false).map(|_| ()),
            TaskCommands::Remove { company, project, id } => cmd_task_remove(&store, company, project, id, false),
            TaskCommands::List { company, project, stage, assignee } => cmd_task_list(&store, config, company, project, stage, assignee),
            TaskCommands::Watch { company, project } => cmd_task_watch(&store, config, company, project),
            TaskCommands::Summary { company, project } => cmd_task_summary(&store, company, project, false).map(|_| ()),
        },
        Commands::Check { company, project, assignees, from, to, exclude, no_range } => {
            if cmd_check(&store, config, company, project, assignees, from, to, exclude, no_range, false)?.is_err() {
                return Ok(ExitCode::from(CONFLICT_EXIT));
            }
            Ok(())
        }
        Commands::Reset { force } => cmd_reset(&store, force),
        Commands::Completions { shell } => {
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "powershell" => Shell::PowerShell,
                "elvish" => Shell::Elvish,
                _ => return Err(Error::InvalidInput(format!("Unsupported shell: {}", shell))),
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "taskboard", &mut io::stdout());
            Ok(())
        }
    };
    outcome.map(|()| ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_level);

    match run(cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
