use std::fmt;

use adducation_core::model::achievement::FIRST_LOGIN;
use adducation_core::model::{Difficulty, InterviewQuestionRequest, QuizRequest};
use services::backend::BackendConfig;
use services::{AppServices, Clock, LlmConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DB_URL: &str = "sqlite://adducation.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { name: &'static str, raw: String },
    InvalidDifficulty { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid <{name}> value: {raw}"),
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid difficulty: {raw} (beginner, intermediate, advanced)")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                              backend, session and progress overview");
    eprintln!("  login <email> <password>            sign in and load progress");
    eprintln!("  models                              list models offered by the LLM provider");
    eprintln!("  quiz <topic> [difficulty] [count]   generate quiz questions");
    eprintln!("  interview <role> [difficulty]       generate an interview question");
    eprintln!("  xp <amount> [reason]                award XP to the signed-in user");
    eprintln!("  logout                              clear the cached session");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ADDUCATION_DB_URL, ADDUCATION_API_BASE_URL, OPENROUTER_BASE_URL,");
    eprintln!("  OPENROUTER_API_KEY, ADDUCATION_APP_REFERER, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    Login { email: String, password: String },
    Models,
    Quiz(QuizRequest),
    Interview { role: String, difficulty: Difficulty },
    Xp { amount: u32, reason: String },
    Logout,
}

struct Args {
    db_url: String,
    command: Command,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut db_url = std::env::var("ADDUCATION_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let Some(name) = positional.next() else {
            return Ok(None);
        };
        let command = Command::parse(&name, &mut positional)?;
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(Some(Self { db_url, command }))
    }
}

impl Command {
    fn parse(name: &str, rest: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let command = match name {
            "status" => Self::Status,
            "models" => Self::Models,
            "logout" => Self::Logout,
            "login" => Self::Login {
                email: required(rest, "email")?,
                password: required(rest, "password")?,
            },
            "quiz" => {
                let topic = required(rest, "topic")?;
                let difficulty = optional_difficulty(rest.next())?;
                let question_count = match rest.next() {
                    Some(raw) => parse_number(&raw, "count")?,
                    None => 5,
                };
                Self::Quiz(QuizRequest {
                    topic,
                    difficulty,
                    question_count,
                })
            }
            "interview" => Self::Interview {
                role: required(rest, "role")?,
                difficulty: optional_difficulty(rest.next())?,
            },
            "xp" => {
                let raw = required(rest, "amount")?;
                let amount = parse_number(&raw, "amount")?;
                let reason = rest.collect::<Vec<_>>().join(" ");
                Self::Xp {
                    amount,
                    reason: if reason.is_empty() {
                        "manual award".into()
                    } else {
                        reason
                    },
                }
            }
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

fn required(
    rest: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<String, ArgsError> {
    rest.next().ok_or(ArgsError::MissingArgument { name })
}

fn parse_number(raw: &str, name: &'static str) -> Result<u32, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidNumber {
        name,
        raw: raw.to_string(),
    })
}

fn optional_difficulty(raw: Option<String>) -> Result<Difficulty, ArgsError> {
    match raw {
        None => Ok(Difficulty::default()),
        Some(raw) => Difficulty::parse(&raw).ok_or(ArgsError::InvalidDifficulty { raw }),
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// The store creates its own file; only the parent directory must exist.
fn ensure_db_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            return Err(err.into());
        }
    };

    ensure_db_dir(&parsed.db_url)?;
    let services = AppServices::new_sqlite(
        &parsed.db_url,
        BackendConfig::from_env(),
        LlmConfig::from_env(),
        Clock::system(),
    )
    .await?;

    match parsed.command {
        Command::Status => status(&services).await?,
        Command::Login { email, password } => {
            let auth = services.auth();
            if !auth.login(&email, &password).await {
                let reason = auth.last_error().unwrap_or_else(|| "login failed".into());
                return Err(reason.into());
            }
            let Some(user) = auth.current_user() else {
                println!("Signed in.");
                return Ok(());
            };
            println!("Signed in as {}.", user.display_name());

            let gamification = services.gamification();
            match gamification.load_user_progress(&user.id).await {
                Ok(_) => {
                    gamification.update_streak().await?;
                    gamification.unlock_achievement(FIRST_LOGIN).await?;
                }
                Err(err) => eprintln!("progress unavailable: {err}"),
            }
            status(&services).await?;
        }
        Command::Models => {
            for model in services.llm().available_models().await? {
                let tag = if model.is_free { " (free)" } else { "" };
                println!("{}{tag}  {}", model.id, model.name);
            }
        }
        Command::Quiz(request) => {
            let parsed = services.llm().generate_quiz_questions(&request).await?;
            for (n, question) in parsed.questions.iter().enumerate() {
                println!("{}. {}", n + 1, question.question);
                for (idx, option) in question.options.iter().enumerate() {
                    let marker = if idx == question.correct_answer { '*' } else { ' ' };
                    println!("   {marker} {}) {option}", option_letter(idx));
                }
                if !question.explanation.is_empty() {
                    println!("     {}", question.explanation);
                }
            }
            tracing::debug!(stage = %parsed.stage, "quiz parsed");
        }
        Command::Interview { role, difficulty } => {
            let skills = services
                .auth()
                .current_user()
                .map(|user| user.skills().to_vec())
                .unwrap_or_default();
            let question = services
                .llm()
                .generate_interview_question(&InterviewQuestionRequest {
                    job_role: role,
                    difficulty,
                    skills,
                })
                .await?;
            println!("{question}");
        }
        Command::Xp { amount, reason } => {
            match services.gamification().add_xp(amount, &reason).await? {
                Some(update) => {
                    println!(
                        "{} XP total, level {}{}",
                        update.progress.total_xp,
                        update.progress.current_level,
                        if update.leveled_up { " (level up!)" } else { "" }
                    );
                    for id in update.unlocked {
                        println!("Achievement unlocked: {id}");
                    }
                }
                None => println!("No progress loaded; sign in first."),
            }
        }
        Command::Logout => {
            services.logout().await?;
            println!("Signed out.");
        }
    }
    Ok(())
}

async fn status(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let backend = services.backend();
    println!(
        "Backend: {} ({})",
        backend.config().base_url,
        if backend.is_available() { "up" } else { "down" }
    );

    let auth = services.auth();
    match auth.current_user() {
        Some(user) => println!("User: {} <{}>", user.display_name(), user.email),
        None => println!("User: signed out"),
    }

    let settings = services.app_settings().load().await?;
    let model = services.llm().selected_model().await?;
    let key_state = if services.llm().api_key().await?.is_some() {
        "set"
    } else {
        "not set"
    };
    println!("Model: {model} (API key {key_state})");
    println!("Theme: {}", settings.theme().as_str());

    if let Some(dashboard) = services.gamification().dashboard() {
        println!(
            "Level {} ({} / {} XP), {} XP total",
            dashboard.level.level,
            dashboard.level.xp_into_level,
            dashboard.level.xp_per_level,
            dashboard.total_xp
        );
        println!(
            "Streak: {} days (best {}){}",
            dashboard.current_streak,
            dashboard.longest_streak,
            if dashboard.streak_at_risk { ", at risk" } else { "" }
        );
        for achievement in dashboard.achievements {
            println!("  {} {}", achievement.icon, achievement.title);
        }
    }
    Ok(())
}

fn option_letter(idx: usize) -> char {
    u8::try_from(idx)
        .ok()
        .and_then(|n| b'A'.checked_add(n))
        .map_or('?', char::from)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn quiz_defaults_and_overrides() {
        let args = parse(&["quiz", "sql"]).unwrap().unwrap();
        assert_eq!(
            args.command,
            Command::Quiz(QuizRequest {
                topic: "sql".into(),
                difficulty: Difficulty::Intermediate,
                question_count: 5,
            })
        );

        let args = parse(&["--db", "sqlite::memory:", "quiz", "sql", "hard", "3"])
            .unwrap()
            .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert!(matches!(
            args.command,
            Command::Quiz(QuizRequest { difficulty: Difficulty::Advanced, question_count: 3, .. })
        ));
    }

    #[test]
    fn xp_joins_reason_words() {
        let args = parse(&["xp", "25", "finished", "lesson"]).unwrap().unwrap();
        assert_eq!(
            args.command,
            Command::Xp {
                amount: 25,
                reason: "finished lesson".into()
            }
        );
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(matches!(parse(&["login", "a@b.c"]), Err(ArgsError::MissingArgument { name: "password" })));
        assert!(matches!(parse(&["xp", "lots"]), Err(ArgsError::InvalidNumber { .. })));
        assert!(matches!(parse(&["quiz", "sql", "extreme"]), Err(ArgsError::InvalidDifficulty { .. })));
        assert!(matches!(parse(&["dance"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(parse(&["status", "--verbose"]), Err(ArgsError::UnknownArg(_))));
        assert!(parse(&[]).unwrap().is_none());
    }

    #[test]
    fn option_letters() {
        assert_eq!(option_letter(0), 'A');
        assert_eq!(option_letter(3), 'D');
    }
}
