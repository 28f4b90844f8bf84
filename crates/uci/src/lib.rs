//! UCI (Universal Chess Interface) protocol library with extensions.
//!
//! Types and parsing for the text protocol spoken between a chess GUI and
//! an engine, plus a typed side-channel for structured debug output.
//!
//! # Standard commands
//!
//! - `uci` / `uciok` - handshake and identification
//! - `isready` / `readyok` - synchronization
//! - `position (startpos | fen <fen>) [moves <move>...]` - set position
//! - `go [wtime|btime|winc|binc|movestogo|movetime|depth|nodes|infinite]`
//! - `stop`, `quit`
//!
//! # Extensions
//!
//! - `extensions` - query supported extensions
//! - `info string ext:<name> <json>` - structured debug payloads

mod command;
mod extension;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use extension::{Extension, ExtensionValue};
pub use info::{EngineInfo, InfoBuilder, Score};

use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UciError {
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Messages sent from the engine to the GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id {
        name: Option<String>,
        author: Option<String>,
    },
    /// Handshake complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search progress.
    Info(EngineInfo),
    /// Search finished.
    BestMove { mv: String, ponder: Option<String> },
    /// Extension declaration.
    Extension(Extension),
    /// Extensions query complete.
    ExtensionsOk,
}

impl EngineMessage {
    /// Formats the message as a protocol line (without the newline).
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => match ponder {
                Some(p) => format!("bestmove {} ponder {}", mv, p),
                None => format!("bestmove {}", mv),
            },
            EngineMessage::Extension(ext) => {
                format!("extension {} description \"{}\"", ext.name, ext.description)
            }
            EngineMessage::ExtensionsOk => "extensionsok".to_string(),
        }
    }
}

/// Engine-side protocol endpoint over arbitrary reader/writer pairs.
pub struct UciEngine<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> UciEngine<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads and parses the next GUI command. EOF reads as `quit`.
    pub fn read_command(&mut self) -> Result<GuiCommand, UciError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(GuiCommand::Quit);
        }
        GuiCommand::parse(&line)
    }

    /// Writes one message and flushes.
    pub fn send(&mut self, msg: &EngineMessage) -> Result<(), UciError> {
        writeln!(self.writer, "{}", msg.to_uci())?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn send_id(&mut self, name: &str, author: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::Id {
            name: Some(name.to_string()),
            author: Some(author.to_string()),
        })
    }

    pub fn send_uciok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::UciOk)
    }

    pub fn send_readyok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::ReadyOk)
    }

    pub fn send_bestmove(&mut self, mv: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::BestMove {
            mv: mv.to_string(),
            ponder: None,
        })
    }

    pub fn send_info(&mut self, info: EngineInfo) -> Result<(), UciError> {
        self.send(&EngineMessage::Info(info))
    }

    pub fn send_extension(&mut self, name: &str, description: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::Extension(Extension {
            name: name.to_string(),
            description: description.to_string(),
        }))
    }

    pub fn send_extensionsok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::ExtensionsOk)
    }
}

/// A protocol endpoint over stdin/stdout.
pub fn stdio_engine() -> UciEngine<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    UciEngine::new(std::io::BufReader::new(std::io::stdin()), std::io::stdout())
}
