//! Terminal rendering of session events

use chatiq_sync::chatiq_store::{Conversation, Message, Sender};
use chatiq_sync::{ChatEvent, TransportStatus};
use chrono::{DateTime, Utc};
use console::style;
use std::time::Duration;

pub fn print_event(event: ChatEvent) {
    match event {
        ChatEvent::ActivationStarted { conversation_id } => {
            println!("{} loading {}...", style("~").dim(), conversation_id);
        }
        ChatEvent::TimelineUpdated {
            conversation_id,
            len,
        } => {
            println!(
                "{} {} has {} message(s)",
                style("=").cyan(),
                conversation_id,
                len
            );
        }
        ChatEvent::MessageReceived { message } => print_message(&message),
        ChatEvent::ConversationUpdated { conversation } => {
            if conversation.unread_count > 0 {
                println!(
                    "{} {} ({} unread): {}",
                    style("*").yellow(),
                    conversation.display_name,
                    conversation.unread_count,
                    conversation.last_message_preview.as_deref().unwrap_or("")
                );
            }
        }
        ChatEvent::HistoryDegraded {
            conversation_id,
            error,
        } => {
            println!(
                "{} history for {} unavailable ({}), showing live messages only",
                style("!").yellow(),
                conversation_id,
                error
            );
        }
        ChatEvent::HistoryCleared { conversation_id } => {
            println!("{} cleared {}", style("-").green(), conversation_id);
        }
        ChatEvent::ConversationDeleted { conversation_id } => {
            println!("{} deleted {}", style("-").green(), conversation_id);
        }
        ChatEvent::CommandFailed {
            conversation_id,
            error,
        } => {
            eprintln!(
                "{} {}: {}",
                style("x").red().bold(),
                conversation_id,
                error.user_message()
            );
        }
        ChatEvent::ConnectionChanged { status } => {
            let label = match status {
                TransportStatus::Connecting => style("connecting").yellow(),
                TransportStatus::Connected => style("connected").green(),
                TransportStatus::Disconnected => style("disconnected").red(),
            };
            println!("{} live channel {}", style("#").dim(), label);
        }
    }
}

pub fn print_message(message: &Message) {
    let author = match message.sender {
        Sender::Agent => style("agent").blue().bold(),
        Sender::Visitor => style("visitor").magenta().bold(),
    };
    println!(
        "[{}] {}: {}",
        style(message.created_at.format("%H:%M")).dim(),
        author,
        message.text
    );
}

pub fn print_conversation(conversation: &Conversation, open: bool) {
    let marker = if open { style(">").green() } else { style(" ") };
    let unread = if conversation.unread_count > 0 {
        style(format!("({})", conversation.unread_count)).yellow().to_string()
    } else {
        String::new()
    };
    let age = conversation
        .last_activity_time
        .map(format_age)
        .unwrap_or_else(|| "no activity".to_string());

    println!(
        "{} {} {} {} - {}",
        marker,
        style(&conversation.id).bold(),
        conversation.display_name,
        unread,
        style(age).dim()
    );
}

fn format_age(time: DateTime<Utc>) -> String {
    let elapsed = (Utc::now() - time).to_std().unwrap_or_default();
    let rounded = Duration::from_secs(elapsed.as_secs());
    format!("{} ago", humantime::format_duration(rounded))
}
