//! /list command - conversations grouped by recency

use super::CommandResult;
use memora_client::ConversationId;
use memora_engine::RecencyBucket;

pub struct ListCommand;

impl ListCommand {
    pub fn execute(buckets: &[RecencyBucket], selected: Option<ConversationId>) -> CommandResult {
        if buckets.is_empty() {
            return CommandResult::Message(
                "No conversations yet. Type a message to start one.".to_string(),
            );
        }

        let mut output = String::new();
        for bucket in buckets {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(bucket.label.as_str());
            output.push('\n');

            for conversation in &bucket.conversations {
                let marker = if Some(conversation.id) == selected { "*" } else { " " };
                output.push_str(&format!(
                    " {} {:>6}  {}\n",
                    marker,
                    conversation.id.to_string(),
                    conversation.title
                ));
            }
        }

        CommandResult::Message(output.trim_end().to_string())
    }
}
