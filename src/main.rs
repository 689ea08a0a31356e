use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use inquire::Password;
use std::path::PathBuf;
use std::process;
use todostore::{App, Outcome, TaskView};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - Multi-user to-do lists backed by SQLite")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (default: platform data directory)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log store activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account
    Signup {
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Log in and remember the session
    Login {
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the current session
    Logout,

    /// Show who is logged in
    Whoami,

    /// Add a task to your list
    Add {
        #[arg(num_args = 1.., trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Show your list
    #[command(alias = "ls")]
    List,

    /// Mark a task as done
    Done { id: i64 },

    /// Mark a task as not done
    Undo { id: i64 },

    /// Delete a task
    Delete { id: i64 },

    /// Delete every task in your list
    Clear,
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("todostore"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// RUST_LOG wins; otherwise --verbose picks debug over warn
fn log_filter(verbose: bool, rust_log: Option<String>) -> EnvFilter {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(if verbose { "debug" } else { "warn" }),
    }
}

/// Use the password given on the command line, or ask for it without echo
fn password_or_prompt(given: Option<String>, prompt: impl FnOnce() -> Result<String>) -> Result<String> {
    match given {
        Some(password) => Ok(password),
        None => prompt(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, std::env::var("RUST_LOG").ok()))
        .with_writer(std::io::stderr)
        .init();

    let store_path = cli.store_path.clone().unwrap_or_else(default_store_path);

    let mut app = App::open(&store_path)?;

    let outcome = match cli.command {
        Commands::Signup { username, password } => {
            let password = password_or_prompt(password, || Ok(Password::new("Choose a password:").prompt()?))?;
            app.sign_up(&username, &password)?
        }
        Commands::Login { username, password } => {
            let password = password_or_prompt(password, || {
                Ok(Password::new("Password:").without_confirmation().prompt()?)
            })?;
            app.login(&username, &password)?
        }
        Commands::Logout => app.logout()?,
        Commands::Whoami => app.whoami(),
        Commands::Add { text } => app.add_task(&text.join(" "))?,
        Commands::List => {
            match app.task_view()? {
                Some(view) => print_view(&view, cli.json)?,
                None => report(&Outcome::Error("Please login first.".to_string()), cli.json)?,
            }
            return Ok(());
        }
        Commands::Done { id } => app.set_done(id, true)?,
        Commands::Undo { id } => app.set_done(id, false)?,
        Commands::Delete { id } => app.delete_task(id)?,
        Commands::Clear => app.clear_all()?,
    };

    report(&outcome, cli.json)
}

fn report(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
    } else {
        match outcome {
            Outcome::Success(m) => println!("{}", m.green()),
            Outcome::Info(m) => println!("{}", m),
            Outcome::Warning(m) => println!("{}", m.yellow()),
            Outcome::Error(m) => eprintln!("{}", m.red()),
        }
    }

    if outcome.is_error() {
        process::exit(1);
    }
    Ok(())
}

fn print_view(view: &TaskView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    println!("{}", view.heading().bold());
    if view.tasks.is_empty() {
        println!("No tasks yet. Add one with `todostore add`.");
        return Ok(());
    }

    for task in &view.tasks {
        let id = format!("#{:<4}", task.id).dimmed();
        if task.done {
            println!("[x] {} {}", id, task.task.strikethrough().dimmed());
        } else {
            println!("[ ] {} {}", id, task.task);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_defaults() {
        assert_eq!(log_filter(false, None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(true, None).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(
            log_filter(true, Some(" ".to_string())).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn test_log_filter_honours_rust_log() {
        assert_eq!(
            log_filter(false, Some("todostore=trace".to_string())).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(
            log_filter(true, Some("info".to_string())).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }

    #[test]
    fn test_password_flag_skips_prompt() {
        let password = password_or_prompt(Some("pw1".to_string()), || panic!("should not prompt")).unwrap();
        assert_eq!(password, "pw1");
    }

    #[test]
    fn test_missing_password_prompts() {
        let password = password_or_prompt(None, || Ok("typed".to_string())).unwrap();
        assert_eq!(password, "typed");
    }

    #[test]
    fn test_cli_password_is_optional() {
        let cli = Cli::try_parse_from(["todostore", "login", "alice"]).unwrap();
        match cli.command {
            Commands::Login { username, password } => {
                assert_eq!(username, "alice");
                assert!(password.is_none());
            }
            _ => panic!("expected login"),
        }
    }
}
