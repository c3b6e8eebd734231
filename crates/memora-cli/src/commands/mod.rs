//! Slash commands for interactive mode

mod conversation;
mod list;

pub use conversation::ConversationCommand;
pub use list::ListCommand;

use memora_client::ConversationId;

/// Result of parsing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Start a new chat with nothing selected
    NewChat,
    /// Show the conversation list grouped by recency
    List,
    /// Open a conversation and show its history
    Open(ConversationId),
    /// Delete a conversation
    Delete(ConversationId),
    /// Reload the conversation list from the backend
    Refresh,
    /// Sign out
    Logout,
    /// Show a message to the user (not sent to the backend)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command; `None` if the input is a chat message
pub fn parse_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "new" | "n" => CommandResult::NewChat,

        "list" | "ls" | "l" => CommandResult::List,

        "open" | "o" => ConversationCommand::open(args),

        "delete" | "rm" => ConversationCommand::delete(args),

        "refresh" | "r" => CommandResult::Refresh,

        "logout" => CommandResult::Logout,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /new, /n             Start a new chat
  /list, /ls           List conversations by recency
  /open, /o <id>       Open a conversation
  /delete, /rm <id>    Delete a conversation
  /refresh, /r         Reload the conversation list
  /logout              Sign out
  /quit, /exit, /q     Exit memora

Anything else is sent as a message. Ctrl-C stops a reply in progress."#
        .to_string()
}
