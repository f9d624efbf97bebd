//! CLI channel: interactive terminal chat.
//!
//! Reads lines from stdin, writes replies to stdout. A line may attach a
//! media file with an `audio:` or `imagen:` (also `image:`) prefix, or by
//! being the path of an existing file.

use async_trait::async_trait;
use despensa_core::channel::{Attachment, AttachmentKind, Channel, ChannelId, ChannelMessage};
use despensa_core::error::ChannelError;
use despensa_core::media::MediaKind;
use std::path::Path;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const EXIT_COMMANDS: &[&str] = &["salir", "exit", "quit"];

/// What one typed line means.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Empty,
    Exit,
    Text(String),
    Media { path: String, kind: AttachmentKind },
}

/// Classify a single input line.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    if line.is_empty() {
        return ParsedLine::Empty;
    }
    if EXIT_COMMANDS.contains(&line.to_lowercase().as_str()) {
        return ParsedLine::Exit;
    }

    let prefixed = [
        ("audio:", AttachmentKind::Audio),
        ("imagen:", AttachmentKind::Image),
        ("image:", AttachmentKind::Image),
    ];
    for (prefix, kind) in prefixed {
        if let Some(rest) = strip_prefix_ignore_case(line, prefix) {
            let path = rest.trim();
            if !path.is_empty() {
                return ParsedLine::Media {
                    path: path.to_string(),
                    kind,
                };
            }
        }
    }

    let candidate = Path::new(line);
    if candidate.is_file() {
        let kind = match MediaKind::from_path(candidate) {
            MediaKind::Audio => AttachmentKind::Audio,
            MediaKind::Image => AttachmentKind::Image,
        };
        return ParsedLine::Media {
            path: line.to_string(),
            kind,
        };
    }

    ParsedLine::Text(line.to_string())
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// Build the channel message for a parsed line, if it carries one.
pub fn to_message(channel_id: &ChannelId, parsed: ParsedLine) -> Option<ChannelMessage> {
    match parsed {
        ParsedLine::Text(text) => Some(ChannelMessage::text(channel_id.clone(), "local_user", text)),
        ParsedLine::Media { path, kind } => {
            let mut msg = ChannelMessage::text(channel_id.clone(), "local_user", "");
            msg.attachments.push(Attachment {
                kind,
                url: path,
                mime_type: None,
            });
            Some(msg)
        }
        ParsedLine::Empty | ParsedLine::Exit => None,
    }
}

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_line(&line) {
                        ParsedLine::Exit => break,
                        parsed => {
                            let Some(msg) = to_message(&channel_id, parsed) else {
                                continue;
                            };
                            if tx.send(Ok(msg)).await.is_err() {
                                break;
                            }
                        }
                    },
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _recipient: &str, content: &str) -> Result<(), ChannelError> {
        println!("\n🤖 {content}\n");
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // local user
    }
}
