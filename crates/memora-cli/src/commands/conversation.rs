//! /open and /delete - commands addressing one conversation by id

use super::CommandResult;
use memora_client::ConversationId;

pub struct ConversationCommand;

impl ConversationCommand {
    pub fn open(args: &str) -> CommandResult {
        match parse_id(args) {
            Some(id) => CommandResult::Open(id),
            None => usage("open", args),
        }
    }

    pub fn delete(args: &str) -> CommandResult {
        match parse_id(args) {
            Some(id) => CommandResult::Delete(id),
            None => usage("delete", args),
        }
    }
}

fn parse_id(args: &str) -> Option<ConversationId> {
    args.split_whitespace()
        .next()?
        .parse::<i64>()
        .ok()
        .map(ConversationId::Confirmed)
}

fn usage(command: &str, args: &str) -> CommandResult {
    if args.is_empty() {
        CommandResult::Message(format!(
            "Usage: /{} <id>\nUse /list to see conversation ids.",
            command
        ))
    } else {
        CommandResult::Message(format!("Not a conversation id: '{}'", args))
    }
}
