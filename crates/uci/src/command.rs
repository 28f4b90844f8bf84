//! GUI-to-engine command parsing.

use crate::UciError;

/// Commands sent from the GUI to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Start the UCI handshake.
    Uci,
    /// Query supported extensions (custom).
    Extensions,
    /// Synchronization ping.
    IsReady,
    /// Set up a position. `fen: None` means the starting position.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start searching.
    Go(GoOptions),
    /// Stop the running search.
    Stop,
    /// Exit.
    Quit,
    /// Anything unrecognized, kept for forward compatibility.
    Unknown(String),
}

/// Arguments of the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Exact search time in milliseconds.
    pub movetime: Option<u64>,
    /// Depth cap in plies.
    pub depth: Option<u32>,
    /// Node cap.
    pub nodes: Option<u64>,
    /// White's remaining clock in milliseconds.
    pub wtime: Option<u64>,
    /// Black's remaining clock in milliseconds.
    pub btime: Option<u64>,
    /// White's increment per move in milliseconds.
    pub winc: Option<u64>,
    /// Black's increment per move in milliseconds.
    pub binc: Option<u64>,
    /// Moves until the next time control.
    pub movestogo: Option<u32>,
    /// Search until `stop`.
    pub infinite: bool,
}

impl GuiCommand {
    /// Parses one protocol line.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        match parts.next().unwrap_or("") {
            "uci" => Ok(GuiCommand::Uci),
            "extensions" => Ok(GuiCommand::Extensions),
            "isready" => Ok(GuiCommand::IsReady),
            "stop" => Ok(GuiCommand::Stop),
            "quit" => Ok(GuiCommand::Quit),
            "position" => Self::parse_position(parts),
            "go" => Ok(GuiCommand::Go(Self::parse_go(parts))),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let fen = match parts.next() {
            Some("startpos") => None,
            Some("fen") => {
                // FEN fields run until "moves" or end of line.
                let mut fields = Vec::new();
                for part in parts.by_ref() {
                    if part == "moves" {
                        let moves = parts.map(str::to_string).collect();
                        return Ok(GuiCommand::Position {
                            fen: Some(fields.join(" ")),
                            moves,
                        });
                    }
                    fields.push(part);
                }
                if fields.is_empty() {
                    return Err(UciError::ParseError("empty FEN".to_string()));
                }
                return Ok(GuiCommand::Position {
                    fen: Some(fields.join(" ")),
                    moves: Vec::new(),
                });
            }
            Some(other) => {
                return Err(UciError::ParseError(format!(
                    "expected 'startpos' or 'fen', got '{}'",
                    other
                )));
            }
            None => {
                return Err(UciError::ParseError(
                    "position needs 'startpos' or 'fen'".to_string(),
                ));
            }
        };

        let rest: Vec<&str> = parts.collect();
        let moves = match rest.iter().position(|&s| s == "moves") {
            Some(idx) => rest[idx + 1..].iter().map(|s| s.to_string()).collect(),
            None => Vec::new(),
        };
        Ok(GuiCommand::Position { fen, moves })
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> GoOptions {
        let mut opts = GoOptions::default();
        let mut parts = parts.peekable();

        while let Some(keyword) = parts.next() {
            match keyword {
                "movetime" => opts.movetime = parts.next().and_then(|v| v.parse().ok()),
                "depth" => opts.depth = parts.next().and_then(|v| v.parse().ok()),
                "nodes" => opts.nodes = parts.next().and_then(|v| v.parse().ok()),
                "wtime" => opts.wtime = parts.next().and_then(|v| v.parse().ok()),
                "btime" => opts.btime = parts.next().and_then(|v| v.parse().ok()),
                "winc" => opts.winc = parts.next().and_then(|v| v.parse().ok()),
                "binc" => opts.binc = parts.next().and_then(|v| v.parse().ok()),
                "movestogo" => opts.movestogo = parts.next().and_then(|v| v.parse().ok()),
                "infinite" => opts.infinite = true,
                _ => {}
            }
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands() {
        assert_eq!(GuiCommand::parse("uci").unwrap(), GuiCommand::Uci);
        assert_eq!(GuiCommand::parse("isready").unwrap(), GuiCommand::IsReady);
        assert_eq!(GuiCommand::parse("stop").unwrap(), GuiCommand::Stop);
        assert_eq!(GuiCommand::parse("quit").unwrap(), GuiCommand::Quit);
        assert_eq!(
            GuiCommand::parse("extensions").unwrap(),
            GuiCommand::Extensions
        );
    }

    #[test]
    fn unknown_commands_are_preserved() {
        assert_eq!(
            GuiCommand::parse("ponderhit now").unwrap(),
            GuiCommand::Unknown("ponderhit now".to_string())
        );
    }

    #[test]
    fn position_startpos() {
        assert_eq!(
            GuiCommand::parse("position startpos").unwrap(),
            GuiCommand::Position {
                fen: None,
                moves: vec![]
            }
        );
    }

    #[test]
    fn position_startpos_with_moves() {
        assert_eq!(
            GuiCommand::parse("position startpos moves e2e4 e7e5 g1f3").unwrap(),
            GuiCommand::Position {
                fen: None,
                moves: vec!["e2e4".into(), "e7e5".into(), "g1f3".into()]
            }
        );
    }

    #[test]
    fn position_fen() {
        let line = "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        assert_eq!(
            GuiCommand::parse(line).unwrap(),
            GuiCommand::Position {
                fen: Some(
                    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string()
                ),
                moves: vec![]
            }
        );
    }

    #[test]
    fn position_fen_with_moves() {
        let line = "position fen 8/8/8/8/8/8/8/K6k w - - 0 1 moves a1a2 h1h2";
        assert_eq!(
            GuiCommand::parse(line).unwrap(),
            GuiCommand::Position {
                fen: Some("8/8/8/8/8/8/8/K6k w - - 0 1".to_string()),
                moves: vec!["a1a2".into(), "h1h2".into()]
            }
        );
    }

    #[test]
    fn position_without_argument_fails() {
        assert!(GuiCommand::parse("position").is_err());
        assert!(GuiCommand::parse("position sideways").is_err());
    }

    #[test]
    fn go_clock_options() {
        let cmd =
            GuiCommand::parse("go wtime 300000 btime 300000 winc 2000 binc 2000 movestogo 40")
                .unwrap();
        let GuiCommand::Go(opts) = cmd else {
            panic!("expected go");
        };
        assert_eq!(opts.wtime, Some(300_000));
        assert_eq!(opts.btime, Some(300_000));
        assert_eq!(opts.winc, Some(2_000));
        assert_eq!(opts.binc, Some(2_000));
        assert_eq!(opts.movestogo, Some(40));
        assert!(!opts.infinite);
    }

    #[test]
    fn go_caps_and_overrides() {
        let GuiCommand::Go(opts) =
            GuiCommand::parse("go depth 12 nodes 500000 movetime 1000").unwrap()
        else {
            panic!("expected go");
        };
        assert_eq!(opts.depth, Some(12));
        assert_eq!(opts.nodes, Some(500_000));
        assert_eq!(opts.movetime, Some(1_000));
    }

    #[test]
    fn go_infinite() {
        let GuiCommand::Go(opts) = GuiCommand::parse("go infinite").unwrap() else {
            panic!("expected go");
        };
        assert!(opts.infinite);
    }

    #[test]
    fn go_ignores_unknown_words() {
        let GuiCommand::Go(opts) = GuiCommand::parse("go ponder depth 3").unwrap() else {
            panic!("expected go");
        };
        assert_eq!(opts.depth, Some(3));
    }
}
