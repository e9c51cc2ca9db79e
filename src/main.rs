use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use prepdeck::catalog::QuestionId;
use prepdeck::exam::{ExamAnswers, grade_exam};
use prepdeck::ledger::LedgerSnapshot;
use prepdeck::profile::{ExamOutcome, UserProfile};
use prepdeck::{Config, FileStore, ProgressLedger, QuestionCatalog, UserStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "prepdeck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding profile data
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Single-user progress ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerCommand,
    },
    #[command(flatten)]
    Profile(ProfileCommand),
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Manage local profiles
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Mark a question as completed
    Complete { question: QuestionId },
    /// Mark a question as not completed
    Uncomplete { question: QuestionId },
    /// Toggle a question bookmark
    Bookmark { question: QuestionId },
    /// Record an exam result
    Exam {
        /// Exam or category ID
        exam_id: String,
        /// Chosen option per exam question, comma separated, graded against the catalog
        #[arg(long, value_delimiter = ',', conflicts_with_all = ["correct", "total"])]
        answers: Vec<usize>,
        /// Number of correct answers
        #[arg(long, requires = "total")]
        correct: Option<u32>,
        /// Number of questions
        #[arg(long, requires = "correct")]
        total: Option<u32>,
        /// Seconds spent
        #[arg(long, default_value_t = 0)]
        time_spent: u64,
    },
    /// Record today's study session and show the streak
    Streak,
    /// Show statistics for a profile
    Stats {
        /// Profile ID or name (current profile if omitted)
        #[arg(long)]
        user: Option<String>,
    },
    /// Export a profile as JSON
    Export {
        /// Profile ID or name (current profile if omitted)
        #[arg(long)]
        user: Option<String>,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a profile export file
    Import { path: PathBuf },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a profile and switch to it
    Create {
        username: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// List profiles
    List,
    /// Switch to a profile by ID or name
    Switch { user: String },
    /// Delete a profile by ID or name
    Delete { user: String },
    /// Show the current profile
    Current,
}

#[derive(Subcommand)]
enum LedgerCommand {
    Complete { question: QuestionId },
    Uncomplete { question: QuestionId },
    Streak,
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Import { path: PathBuf },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prepdeck=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    let store_dir = config.store_dir()?;
    let backend = FileStore::open(&store_dir)
        .with_context(|| format!("Failed to open data directory {:?}", store_dir))?;

    let catalog = match &config.catalog_path {
        Some(path) => Some(QuestionCatalog::load(path)?),
        None => None,
    };

    match cli.command {
        Commands::Ledger { action } => run_ledger(ProgressLedger::new(backend), action),
        Commands::Profile(command) => {
            let mut users =
                UserStore::new(backend).with_default_username(config.default_username.clone());
            users.initialize_default_user()?;
            run_profile(&mut users, catalog.as_ref(), command)
        }
    }
}

fn run_profile(
    users: &mut UserStore<FileStore>,
    catalog: Option<&QuestionCatalog>,
    command: ProfileCommand,
) -> Result<()> {
    match command {
        ProfileCommand::User { action } => run_user(users, action)?,
        ProfileCommand::Complete { question } => {
            check_question(catalog, question);
            if let Some(user) = users.mark_question_completed(question)? {
                println!("Completed {question} ({} done)", user.progress.completed_questions);
            }
        }
        ProfileCommand::Uncomplete { question } => {
            if let Some(user) = users.mark_question_incomplete(question)? {
                println!("Reopened {question} ({} done)", user.progress.completed_questions);
            }
        }
        ProfileCommand::Bookmark { question } => {
            check_question(catalog, question);
            if let Some(user) = users.toggle_bookmark(question)? {
                let state =
                    if user.is_bookmarked(question) { "Bookmarked" } else { "Unbookmarked" };
                println!("{state} {question}");
            }
        }
        ProfileCommand::Exam { exam_id, answers, correct, total, time_spent } => {
            let outcome = match (correct, total) {
                (Some(correct), Some(total)) => {
                    if total == 0 || correct > total {
                        bail!("Expected 0 < total and correct <= total");
                    }
                    let score = (f64::from(correct) / f64::from(total) * 1000.0).round() / 10.0;
                    ExamOutcome { score, correct, total, time_spent, ..Default::default() }
                }
                _ => {
                    let Some(category) = catalog.and_then(|c| c.category(&exam_id)) else {
                        bail!(
                            "No catalog category '{exam_id}'; pass --correct and --total instead"
                        );
                    };
                    let answers: ExamAnswers =
                        category.exam_questions().map(|q| q.id).zip(answers).collect();
                    grade_exam(category, &answers, time_spent)
                }
            };
            if let Some(user) = users.save_exam_result(&exam_id, outcome)? {
                let result = &user.exam_results[&exam_id];
                println!(
                    "{exam_id}: {}% ({}/{}), average {:.1}%",
                    result.score(),
                    result.outcome.correct,
                    result.outcome.total,
                    user.progress.average_score
                );
            }
        }
        ProfileCommand::Streak => {
            let streak = users.update_study_streak()?;
            println!("Study streak: {streak} day{}", if streak == 1 { "" } else { "s" });
        }
        ProfileCommand::Stats { user } => {
            let id = user.map(|u| resolve_user(users, &u)).transpose()?.map(|u| u.id);
            if let Some(catalog) = catalog {
                users.set_total_questions(id.as_deref(), catalog.total_questions() as u32)?;
            }
            let stats = users.user_stats(id.as_deref()).context("No profile selected")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        ProfileCommand::Export { user, output } => {
            let id = user.map(|u| resolve_user(users, &u)).transpose()?.map(|u| u.id);
            let export = users.export_user_data(id.as_deref()).context("No profile selected")?;
            write_json(&serde_json::to_string_pretty(&export)?, output)?;
        }
        ProfileCommand::Import { path } => {
            let payload = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let user = users.import_user_data(&payload)?;
            println!("Imported {} ({})", user.username, user.id);
        }
    }
    Ok(())
}

fn run_user(users: &mut UserStore<FileStore>, action: UserCommand) -> Result<()> {
    match action {
        UserCommand::Create { username, email } => {
            let user = users.create_user(&username, email.as_deref())?;
            println!("Created {} ({})", user.username, user.id);
        }
        UserCommand::List => {
            let current = users.current_user().map(|u| u.id);
            for user in users.all_users() {
                let marker = if current.as_deref() == Some(user.id.as_str()) { "*" } else { " " };
                println!(
                    "{marker} {:<20} {}  {} done, {} exams",
                    user.username,
                    user.id,
                    user.progress.completed_questions,
                    user.progress.completed_exams
                );
            }
        }
        UserCommand::Switch { user } => {
            let target = resolve_user(users, &user)?;
            let user = users.set_current_user(&target.id)?;
            println!("Switched to {}", user.username);
        }
        UserCommand::Delete { user } => {
            let target = resolve_user(users, &user)?;
            if users.delete_user(&target.id) {
                println!("Deleted {}", target.username);
            }
            if users.current_user().is_none() {
                if let Some(next) = users.all_users().first() {
                    let next = users.set_current_user(&next.id)?;
                    println!("Switched to {}", next.username);
                }
            }
        }
        UserCommand::Current => match users.current_user() {
            Some(user) => println!("{} ({})", user.username, user.id),
            None => println!("No current profile"),
        },
    }
    Ok(())
}

fn run_ledger(mut ledger: ProgressLedger<FileStore>, action: LedgerCommand) -> Result<()> {
    match action {
        LedgerCommand::Complete { question } => {
            let completed = ledger.mark_completed(question);
            println!("{} completed", completed.len());
        }
        LedgerCommand::Uncomplete { question } => {
            let completed = ledger.mark_incomplete(question);
            println!("{} completed", completed.len());
        }
        LedgerCommand::Streak => println!("Study streak: {}", ledger.update_streak()),
        LedgerCommand::Export { output } => {
            write_json(&serde_json::to_string_pretty(&ledger.export_all())?, output)?;
        }
        LedgerCommand::Import { path } => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let snapshot: LedgerSnapshot =
                serde_json::from_str(&contents).with_context(|| "Failed to parse ledger snapshot")?;
            println!("Imported {} keys", ledger.import_all(&snapshot));
        }
    }
    Ok(())
}

/// Find a profile by ID first, then by name
fn resolve_user(users: &UserStore<FileStore>, query: &str) -> Result<UserProfile> {
    let directory = users.load_directory();
    directory
        .find(query)
        .or_else(|| directory.find_by_username(query))
        .cloned()
        .with_context(|| format!("No profile matching '{query}'"))
}

fn check_question(catalog: Option<&QuestionCatalog>, question: QuestionId) {
    if catalog.is_some_and(|c| c.find_question(question).is_none()) {
        tracing::warn!(question, "Question is not in the catalog");
    }
}

fn write_json(json: &str, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Wrote {:?}", path);
        }
        None => println!("{json}"),
    }
    Ok(())
}
