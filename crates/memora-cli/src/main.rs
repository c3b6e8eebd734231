//! memora - command-line chat client

mod commands;
mod config;
mod render;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use commands::{CommandResult, ListCommand};
use memora_client::{Credentials, HttpBackend};
use memora_engine::{ChatSession, Error};
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

type Input = Lines<BufReader<Stdin>>;

/// Sign-in attempts before giving up
const MAX_SIGN_IN_ATTEMPTS: u32 = 3;

/// memora - chat with your conversation backend
#[derive(Parser, Debug)]
#[command(name = "memora")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend URL (default: http://localhost:8000)
    #[arg(short, long)]
    server: Option<String>,

    /// Send a single message and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Wait for whole replies instead of streaming them
    #[arg(long)]
    no_stream: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Sign in even if a session exists
    #[arg(long)]
    login: bool,

    /// Create an account and sign in
    #[arg(long, conflicts_with = "login")]
    register: bool,
}

/// What the interactive loop does after a command
enum Flow {
    Continue,
    SignIn,
    Exit,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("memora=debug")
            .with_writer(io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let config = config::Config::load();
    let server_url = config.resolve_server_url(args.server.as_deref());
    let backend = HttpBackend::new(&server_url)
        .with_context(|| format!("Invalid server URL: {}", server_url))?;
    tracing::debug!("Using backend at {}", backend.base_url());

    let mut session = ChatSession::with_backend(Arc::new(backend));
    session.set_streaming(config.streaming() && !args.no_stream);

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let restored = session
        .restore()
        .await
        .with_context(|| format!("Could not reach {}", server_url))?;
    if restored.is_none() || args.login || args.register {
        sign_in(&mut session, &mut input, &config, args.register).await?;
    }

    if let Some(command) = args.command {
        return run_command(&mut session, &command).await;
    }

    run_interactive(&mut session, &mut input, &config).await
}

async fn prompt(input: &mut Input, label: &str, default: Option<&str>) -> anyhow::Result<String> {
    match default {
        Some(value) => print!("{} [{}]: ", label, value),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let line = input
        .next_line()
        .await?
        .context("Input closed before sign-in finished")?;
    let line = line.trim();
    Ok(if line.is_empty() {
        default.unwrap_or_default().to_string()
    } else {
        line.to_string()
    })
}

async fn sign_in(
    session: &mut ChatSession,
    input: &mut Input,
    config: &config::Config,
    register: bool,
) -> anyhow::Result<()> {
    for attempt in 1..=MAX_SIGN_IN_ATTEMPTS {
        let username = if register {
            Some(prompt(input, "Username", config.username.as_deref()).await?)
        } else {
            None
        };
        let email = prompt(input, "Email", config.email.as_deref()).await?;
        let password = match std::env::var("MEMORA_PASSWORD") {
            Ok(password) => password,
            Err(_) => prompt(input, "Password", None).await?,
        };

        let credentials = build_credentials(username, email, password);
        let result = if register {
            session.register(&credentials).await
        } else {
            session.login(&credentials).await
        };

        match result {
            Ok(user) => {
                eprintln!("Signed in as {}", user.username);
                return Ok(());
            }
            Err(e) if e.is_rejection() && attempt < MAX_SIGN_IN_ATTEMPTS => {
                eprintln!("Sign-in failed: {}", e);
            }
            Err(e) => return Err(e).context("Sign-in failed"),
        }
    }
    anyhow::bail!("Sign-in failed after {} attempts", MAX_SIGN_IN_ATTEMPTS)
}

/// The backend looks accounts up by email; a username only matters when registering
fn build_credentials(username: Option<String>, email: String, password: String) -> Credentials {
    Credentials {
        username: username.unwrap_or_default(),
        email,
        password,
    }
}

/// Send one message, printing the reply as it arrives. Ctrl-C stops the reply.
async fn send_and_render(session: &mut ChatSession, text: &str) -> memora_engine::Result<()> {
    let mut events = session.subscribe();
    let handle = session.handle();
    let mut renderer = render::Renderer::new(io::stdout());

    let send = session.send(text);
    tokio::pin!(send);

    let result = loop {
        tokio::select! {
            result = &mut send => break result,
            received = events.recv() => match received {
                Ok(event) => {
                    renderer.render(&event).ok();
                }
                Err(RecvError::Lagged(missed)) => {
                    // The renderer catches up from the next event's full content
                    tracing::debug!("Renderer lagged, {} events skipped", missed);
                }
                Err(RecvError::Closed) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupt received, aborting reply");
                handle.abort();
            }
        }
    };

    // Events emitted after the last poll are still buffered
    loop {
        match events.try_recv() {
            Ok(event) => {
                renderer.render(&event).ok();
            }
            Err(TryRecvError::Lagged(missed)) => {
                tracing::debug!("Renderer lagged, {} events skipped", missed);
            }
            Err(_) => break,
        }
    }
    result
}

fn report_send_error(e: &Error) {
    match e {
        Error::Cancelled => eprintln!("[stopped]"),
        e if e.is_retryable() => {
            eprintln!("Error: {}", e);
            eprintln!("The partial reply was kept. Send your message again to retry.");
        }
        e => eprintln!("Error: {}", e),
    }
}

async fn run_command(session: &mut ChatSession, command: &str) -> anyhow::Result<()> {
    println!("memora> {}", command);
    println!();

    if let Err(e) = send_and_render(session, command).await {
        report_send_error(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn handle_command(session: &mut ChatSession, command: CommandResult) -> anyhow::Result<Flow> {
    match command {
        CommandResult::NewChat => {
            session.new_chat();
            println!("Started a new chat.");
        }
        CommandResult::List => {
            let buckets = session.buckets(&Local::now());
            if let CommandResult::Message(text) = ListCommand::execute(&buckets, session.selected()) {
                println!("{}", text);
            }
        }
        CommandResult::Open(id) => {
            session.open(id).await?;
            if let Some(conversation) = session.conversations().iter().find(|c| c.id == id) {
                println!("== {} ==\n", conversation.title);
            }
            render::render_history(&mut io::stdout(), session.messages())?;
        }
        CommandResult::Delete(id) => {
            let title = session
                .conversations()
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.title.clone())
                .unwrap_or_else(|| id.to_string());
            session.delete_conversation(id).await?;
            println!("Deleted '{}'.", title);
        }
        CommandResult::Refresh => {
            session.refresh_conversations().await?;
            println!("{} conversations.", session.conversations().len());
        }
        CommandResult::Logout => {
            session.logout().await?;
            println!("Signed out.");
            return Ok(Flow::SignIn);
        }
        CommandResult::Message(msg) => {
            println!("{}", msg);
        }
        CommandResult::Exit => return Ok(Flow::Exit),
        CommandResult::Unknown(cmd) => {
            println!("Unknown command: /{}", cmd);
            println!("Type /help for available commands.");
        }
    }
    Ok(Flow::Continue)
}

async fn run_interactive(
    session: &mut ChatSession,
    input: &mut Input,
    config: &config::Config,
) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if io::stderr().is_terminal() {
        if let Some(user) = session.user() {
            eprintln!("memora ({})", user.username);
        }
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = input.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = commands::parse_command(line) {
            match handle_command(session, command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::SignIn) => sign_in(session, input, config, false).await?,
                Ok(Flow::Exit) => break,
                Err(e) => eprintln!("Error: {:#}", e),
            }
            continue;
        }

        println!();
        if let Err(e) = send_and_render(session, line).await {
            report_send_error(&e);
        }
        println!();
    }

    Ok(())
}
