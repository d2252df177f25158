use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docchat_chat::{Answer, DocChat, IngestOutcome, Session};
use docchat_core::config::Config;

#[derive(Parser)]
#[command(name = "docchat", about = "Chat with your documents", version)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the index with the given files, or every supported file in one folder
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Answer from the existing collection instead of plain chat
        #[arg(long)]
        use_index: bool,
    },
    /// Interactive session
    Chat,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Upload(Vec<PathBuf>),
    New,
    History,
    Open(usize),
    Status,
    Quit,
    Help,
    Prompt(String),
    Invalid(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() { return Input::Empty; }
    let Some(rest) = line.strip_prefix('/') else { return Input::Prompt(line.to_string()) };
    let mut parts = rest.split_whitespace();
    match parts.next().unwrap_or("") {
        "upload" => {
            let files: Vec<PathBuf> = parts.map(PathBuf::from).collect();
            if files.is_empty() {
                Input::Invalid("usage: /upload <file>...".into())
            } else {
                Input::Upload(files)
            }
        }
        "new" => Input::New,
        "history" => Input::History,
        "open" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n >= 1 => Input::Open(n - 1),
            _ => Input::Invalid("usage: /open <number from /history>".into()),
        },
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        "help" => Input::Help,
        other => Input::Invalid(format!("unknown command /{other}, try /help")),
    }
}

const HELP: &str = "/upload <file>...  index files (replaces the previous index)
/new               start a new chat
/history           list saved chats
/open <n>          reopen a saved chat
/status            show mode and indexed file count
/quit              leave";

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if let Some(sources) = &answer.sources {
        if !sources.is_empty() { println!("\nSources: {}", sources.join(", ")); }
    }
}

fn print_ingest(outcome: &IngestOutcome) {
    for (file, reason) in &outcome.failures {
        eprintln!("⚠️  could not read {file}: {reason}");
    }
    if outcome.report.indexed {
        println!("✅ Indexed {} files ({} chunks)", outcome.report.files, outcome.report.chunks);
    } else {
        println!("No text found in the uploaded files; staying in chat mode.");
    }
}

async fn ingest(
    app: &DocChat,
    session: &mut Session,
    paths: &[PathBuf],
) -> Result<IngestOutcome> {
    info!(paths = paths.len(), "ingest started");
    match paths {
        [dir] if dir.is_dir() => {
            let outcome = app.ingest_dir(dir).await?;
            session.indexed = outcome.report.indexed;
            session.file_count = outcome.report.files;
            Ok(outcome)
        }
        files => app.ingest_files(session, files).await,
    }
}

async fn answer_once(app: &DocChat, session: &mut Session, prompt: &str) -> Result<Answer> {
    let answer = app.ask(session, prompt).await?;
    info!(mode = ?answer.mode, indexed = session.indexed, "answered");
    Ok(answer)
}

async fn chat_loop(app: &DocChat) -> Result<()> {
    let mut session = Session::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("interactive session started");
    println!("{}\nType /help for commands.", session.status());
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else { break };
        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Invalid(msg) => eprintln!("{msg}"),
            Input::New => {
                session.new_chat();
                println!("Started a new chat.");
            }
            Input::Status => println!("{}", session.status()),
            Input::History => {
                if session.conversations.is_empty() { println!("No saved chats."); }
                for (i, title) in session.titles().iter().enumerate() {
                    println!("{:>3}. {title}", i + 1);
                }
            }
            Input::Open(idx) => {
                if session.open(idx) {
                    for m in &session.messages { println!("[{}] {}", m.role, m.content); }
                } else {
                    eprintln!("No saved chat {}", idx + 1);
                }
            }
            Input::Upload(files) => match ingest(app, &mut session, &files).await {
                Ok(outcome) => print_ingest(&outcome),
                Err(e) => {
                    warn!(error = %e, "upload failed");
                    eprintln!("❌ Upload failed: {e:#}");
                }
            },
            Input::Prompt(prompt) => match answer_once(app, &mut session, &prompt).await {
                Ok(answer) => print_answer(&answer),
                Err(e) => eprintln!("❌ Error: {e:#}"),
            },
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Config::load()?.settings()?;
    info!(
        backend = ?settings.vector.backend,
        collection = %settings.vector.collection,
        model = %settings.llm.model,
        "configuration loaded"
    );
    let app = DocChat::from_settings(&settings)?;
    match cli.command {
        Command::Ingest { paths } => {
            let mut session = Session::new();
            let outcome = ingest(&app, &mut session, &paths).await?;
            print_ingest(&outcome);
        }
        Command::Ask { question, use_index } => {
            let mut session = Session { indexed: use_index, ..Session::default() };
            print_answer(&answer_once(&app, &mut session, &question).await?);
        }
        Command::Chat => chat_loop(&app).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
