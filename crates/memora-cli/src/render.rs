//! Terminal output for engine events and loaded history

use chrono::Local;
use memora_client::{Message, MessageId, Role};
use memora_engine::EngineEvent;
use std::io::{self, Write};

/// Prints a reply as it streams in.
///
/// Output follows the full pending content rather than individual deltas,
/// so events dropped by a lagging receiver are caught up on the next one.
/// Whole replies (streaming disabled) arrive only as `MessageFinalized` and
/// are printed in one go.
pub struct Renderer<W: Write> {
    out: W,
    /// Bytes of the current reply already written
    printed: usize,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    pub fn render(&mut self, event: &EngineEvent) -> io::Result<()> {
        match event {
            EngineEvent::PendingUpdated { content, .. } => {
                self.catch_up(content)?;
                self.out.flush()?;
            }
            EngineEvent::MessageFinalized { message } => {
                self.catch_up(&message.content)?;
                writeln!(self.out)?;
                self.printed = 0;
            }
            EngineEvent::SendFailed { .. } => {
                // Close the partial line; the caller reports the error
                if self.printed > 0 {
                    writeln!(self.out)?;
                }
                self.printed = 0;
            }
            _ => {}
        }
        Ok(())
    }

    fn catch_up(&mut self, content: &str) -> io::Result<()> {
        if let Some(rest) = content.get(self.printed..) {
            write!(self.out, "{}", rest)?;
            self.printed = content.len();
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Print a conversation's messages, oldest first
pub fn render_history(out: &mut impl Write, messages: &[Message]) -> io::Result<()> {
    if messages.is_empty() {
        writeln!(out, "(no messages)")?;
        return Ok(());
    }

    for message in messages {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "memora",
        };
        let time = message.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        writeln!(out, "[{}] {}:", time, who)?;
        writeln!(out, "{}", message.content)?;
        if matches!(message.id, MessageId::Pending | MessageId::Interrupted) {
            writeln!(out, "[incomplete]")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    fn assistant(id: MessageId, content: &str) -> Message {
        Message {
            id,
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_streamed_reply_printed_once() {
        let mut renderer = Renderer::new(Vec::new());
        for (delta, content) in [("Hello", "Hello"), (" there", "Hello there")] {
            renderer
                .render(&EngineEvent::PendingUpdated {
                    delta: delta.into(),
                    content: content.into(),
                })
                .unwrap();
        }
        renderer
            .render(&EngineEvent::MessageFinalized {
                message: assistant(MessageId::Confirmed(2), "Hello there"),
            })
            .unwrap();
        assert_eq!(text(renderer.into_inner()), "Hello there\n");
    }

    #[test]
    fn test_missed_updates_are_caught_up() {
        let mut renderer = Renderer::new(Vec::new());
        renderer
            .render(&EngineEvent::PendingUpdated {
                delta: "a".into(),
                content: "a".into(),
            })
            .unwrap();
        // "b" and "c" were dropped by a lagging receiver
        renderer
            .render(&EngineEvent::PendingUpdated {
                delta: "d".into(),
                content: "abcd".into(),
            })
            .unwrap();
        renderer
            .render(&EngineEvent::MessageFinalized {
                message: assistant(MessageId::Confirmed(2), "abcdef"),
            })
            .unwrap();
        assert_eq!(text(renderer.into_inner()), "abcdef\n");
    }

    #[test]
    fn test_whole_reply_printed_on_finalize() {
        let mut renderer = Renderer::new(Vec::new());
        renderer
            .render(&EngineEvent::MessageFinalized {
                message: assistant(MessageId::Confirmed(2), "All at once"),
            })
            .unwrap();
        assert_eq!(text(renderer.into_inner()), "All at once\n");
    }

    #[test]
    fn test_failure_closes_partial_line() {
        let mut renderer = Renderer::new(Vec::new());
        renderer
            .render(&EngineEvent::PendingUpdated {
                delta: "Hel".into(),
                content: "Hel".into(),
            })
            .unwrap();
        renderer
            .render(&EngineEvent::SendFailed {
                message: "connection reset".into(),
            })
            .unwrap();
        assert_eq!(text(renderer.into_inner()), "Hel\n");
    }

    #[test]
    fn test_history_marks_incomplete_replies() {
        let mut out = Vec::new();
        render_history(
            &mut out,
            &[
                assistant(MessageId::Confirmed(1), "done"),
                assistant(MessageId::Interrupted, "half"),
            ],
        )
        .unwrap();
        let out = text(out);
        assert_eq!(out.matches("[incomplete]").count(), 1);
        assert!(out.contains("memora:\nhalf\n[incomplete]"));
    }
}
