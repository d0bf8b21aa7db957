mod command;
mod render;

use anyhow::{Context, Result};
use chatiq_sync::chatiq_store::ConversationId;
use chatiq_sync::{
    ApiTarget, ChatSession, EndpointSelector, HttpChatApi, SocketTransport, StaticCredentials,
    SyncConfig, DEFAULT_SITE_ID, HOSTED_API_URL, HOSTED_SOCKET_URL,
};
use clap::Parser;
use command::{ApiChoice, Command, HELP};
use console::style;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Answer ChatIQ visitors from the terminal", long_about = None)]
struct Args {
    /// API server base URL
    #[arg(long, default_value = HOSTED_API_URL)]
    api_url: String,

    /// Use the local API server (http://localhost:3000)
    #[arg(long)]
    local: bool,

    /// WebSocket URL of the live channel
    #[arg(long, default_value = HOSTED_SOCKET_URL)]
    socket_url: String,

    /// Site id attached to outgoing messages
    #[arg(long, default_value = DEFAULT_SITE_ID)]
    site_id: String,

    /// Access token; a placeholder is sent when omitted
    #[arg(short, long)]
    token: Option<String>,

    /// Conversation to open on start
    #[arg(short, long)]
    conversation: Option<String>,

    /// Seconds to wait before reconnecting the live channel
    #[arg(long, default_value_t = 3)]
    reconnect_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse();
    let config = SyncConfig {
        api_base_url: args.api_url,
        socket_url: args.socket_url,
        site_id: args.site_id,
        access_token: args.token,
        reconnect_delay: Duration::from_secs(args.reconnect_secs),
        ..SyncConfig::default()
    };

    let endpoint = if args.local {
        EndpointSelector::for_target(ApiTarget::Local)
    } else {
        EndpointSelector::new(&config.api_base_url)
    }
    .context("Invalid API URL")?;
    let api = Arc::new(HttpChatApi::new(config.request_timeout)?);
    let transport = Arc::new(
        SocketTransport::connect(&config.socket_url, config.reconnect_delay)
            .context("Failed to start live channel")?,
    );
    let credentials = Arc::new(StaticCredentials::new(config.access_token.clone()));

    let (session, events) = ChatSession::new(
        api,
        transport.clone(),
        endpoint,
        credentials.clone(),
        &config.site_id,
    );
    let session = Arc::new(session);
    info!("Session started for site {}", config.site_id);

    println!("{}", style("ChatIQ agent console").bold());
    println!("API:  {}", session.endpoint().current());
    println!("Live: {}", config.socket_url);
    println!("Type /help for commands");
    println!("---");

    let event_handle = tokio::spawn({
        let mut events = events;
        async move {
            while let Some(event) = events.next().await {
                render::print_event(event);
            }
        }
    });

    let status_handle = tokio::spawn({
        let session = Arc::clone(&session);
        let mut status_rx = transport.subscribe_status();
        async move {
            loop {
                let state = *status_rx.borrow_and_update();
                session.handle_connection_state(state).await;
                if status_rx.changed().await.is_err() {
                    break;
                }
            }
        }
    });

    if let Some(id) = args.conversation {
        open_in_background(&session, ConversationId::new(id));
    }

    let (stdin_sender, mut stdin_receiver) = tokio::sync::mpsc::unbounded_channel::<String>();
    let stdin_handle = tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut stdin = BufReader::new(tokio::io::stdin());
        let mut line = String::new();

        loop {
            line.clear();
            match stdin.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = line.trim_end_matches(['\r', '\n']);
                    if !line.trim().is_empty() && stdin_sender.send(line.to_string()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut pending: Option<(Command, ConversationId)> = None;
    let mut running = true;
    while running {
        tokio::select! {
            input = stdin_receiver.recv() => {
                let Some(input) = input else {
                    break;
                };

                if let Some((command, conversation_id)) = pending.take() {
                    if matches!(input.trim(), "y" | "yes") {
                        run_destructive(&session, command, &conversation_id).await;
                    } else {
                        println!("Cancelled");
                    }
                    continue;
                }

                match Command::parse(&input) {
                    Command::Quit => running = false,
                    Command::Help => println!("{}", HELP),
                    Command::Open(id) => open_in_background(&session, ConversationId::new(id)),
                    Command::Close => match session.active_conversation() {
                        Some(id) => {
                            session.close(&id);
                            println!("Closed {}", id);
                        }
                        None => println!("No conversation is open"),
                    },
                    command @ (Command::Clear | Command::Delete) => {
                        match session.active_conversation() {
                            Some(id) => {
                                let action = if command == Command::Clear { "Clear" } else { "Delete" };
                                println!("{} chat {}? [y/N]", action, id);
                                pending = Some((command, id));
                            }
                            None => println!("No conversation is open"),
                        }
                    }
                    Command::Api(choice) => {
                        let result = match choice {
                            ApiChoice::Target(target) => session.endpoint().set_target(target),
                            ApiChoice::Url(url) => session.endpoint().set(&url),
                        };
                        match result {
                            Ok(()) => println!("API: {}", session.endpoint().current()),
                            Err(e) => eprintln!("{} {}", style("x").red(), e),
                        }
                    }
                    Command::Token(token) => {
                        let signed_in = token.is_some();
                        credentials.set_token(token);
                        println!("{}", if signed_in { "Token set" } else { "Token cleared" });
                    }
                    Command::List => {
                        let open = session.active_conversation();
                        let conversations = session.conversations();
                        if conversations.is_empty() {
                            println!("No conversations yet");
                        }
                        for conversation in &conversations {
                            render::print_conversation(
                                conversation,
                                open.as_ref() == Some(&conversation.id),
                            );
                        }
                    }
                    Command::Send(text) => match session.active_conversation() {
                        Some(id) => {
                            if let Err(e) = session.send(&id, &text) {
                                eprintln!("{} {}", style("x").red(), e.user_message());
                            }
                        }
                        None => println!("Open a conversation first (/open <id>)"),
                    },
                    Command::Invalid(reason) => eprintln!("{}", reason),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                running = false;
            }
        }
    }

    println!("Goodbye!");
    transport.shutdown();
    stdin_handle.abort();
    status_handle.abort();
    event_handle.abort();
    Ok(())
}

fn open_in_background(session: &Arc<ChatSession>, conversation_id: ConversationId) {
    let session = Arc::clone(session);
    tokio::spawn(async move {
        session.open(conversation_id).await;
    });
}

async fn run_destructive(session: &ChatSession, command: Command, conversation_id: &ConversationId) {
    // Failures are reported through ChatEvent::CommandFailed
    let _ = match command {
        Command::Clear => session.clear_history(conversation_id).await,
        Command::Delete => session.delete_conversation(conversation_id).await,
        _ => Ok(()),
    };
}
