//! The `info` message: search progress reporting.

use crate::ExtensionValue;
use serde::{Deserialize, Serialize};

/// A reported score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Centipawns; 100 is one pawn.
    Cp(i32),
    /// Signed full moves to mate; positive means the engine mates.
    Mate(i32),
}

/// One `info` line worth of search data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time: Option<u64>,
    pub pv: Vec<String>,
    pub currmove: Option<String>,
    pub currmovenumber: Option<u32>,
    /// Table occupancy in permille.
    pub hashfull: Option<u32>,
    pub string: Option<String>,
    /// Structured extension payload, serialized as JSON.
    pub extension: Option<(String, ExtensionValue)>,
}

impl EngineInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats as a protocol line.
    pub fn to_uci(&self) -> String {
        let mut parts = vec!["info".to_string()];

        if let Some(d) = self.depth {
            parts.push(format!("depth {}", d));
        }
        if let Some(d) = self.seldepth {
            parts.push(format!("seldepth {}", d));
        }
        match self.score {
            Some(Score::Cp(cp)) => parts.push(format!("score cp {}", cp)),
            Some(Score::Mate(m)) => parts.push(format!("score mate {}", m)),
            None => {}
        }
        if let Some(n) = self.nodes {
            parts.push(format!("nodes {}", n));
        }
        if let Some(n) = self.nps {
            parts.push(format!("nps {}", n));
        }
        if let Some(t) = self.time {
            parts.push(format!("time {}", t));
        }
        if !self.pv.is_empty() {
            parts.push(format!("pv {}", self.pv.join(" ")));
        }
        if let Some(ref m) = self.currmove {
            parts.push(format!("currmove {}", m));
        }
        if let Some(n) = self.currmovenumber {
            parts.push(format!("currmovenumber {}", n));
        }
        if let Some(h) = self.hashfull {
            parts.push(format!("hashfull {}", h));
        }
        if let Some(ref s) = self.string {
            parts.push(format!("string {}", s));
        }
        if let Some((ref name, ref value)) = self.extension {
            let json = serde_json::to_string(value).unwrap_or_default();
            parts.push(format!("string ext:{} {}", name, json));
        }

        parts.join(" ")
    }

    /// Parses a protocol `info` line; `None` if the line is not one.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.trim().split_whitespace();
        if words.next() != Some("info") {
            return None;
        }

        let words: Vec<&str> = words.collect();
        let mut info = EngineInfo::new();
        let mut i = 0;

        fn value<'a>(words: &[&'a str], i: usize) -> Option<&'a str> {
            words.get(i + 1).copied()
        }
        while i < words.len() {
            match words[i] {
                "depth" => {
                    info.depth = value(&words, i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "seldepth" => {
                    info.seldepth = value(&words, i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "score" => match value(&words, i) {
                    Some("cp") => {
                        info.score = words.get(i + 2).and_then(|v| v.parse().ok()).map(Score::Cp);
                        i += 2;
                    }
                    Some("mate") => {
                        info.score =
                            words.get(i + 2).and_then(|v| v.parse().ok()).map(Score::Mate);
                        i += 2;
                    }
                    _ => {}
                },
                "nodes" => {
                    info.nodes = value(&words, i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "nps" => {
                    info.nps = value(&words, i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "time" => {
                    info.time = value(&words, i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "pv" => {
                    i += 1;
                    while i < words.len() && !is_keyword(words[i]) {
                        info.pv.push(words[i].to_string());
                        i += 1;
                    }
                    continue;
                }
                "currmove" => {
                    info.currmove = value(&words, i).map(str::to_string);
                    i += 1;
                }
                "currmovenumber" => {
                    info.currmovenumber = value(&words, i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "hashfull" => {
                    info.hashfull = value(&words, i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "string" => {
                    let rest = words[i + 1..].join(" ");
                    if let Some(payload) = rest.strip_prefix("ext:") {
                        if let Some((name, json)) = payload.split_once(' ') {
                            if let Ok(value) = serde_json::from_str(json) {
                                info.extension = Some((name.to_string(), value));
                            }
                        }
                    } else {
                        info.string = Some(rest);
                    }
                    break;
                }
                _ => {}
            }
            i += 1;
        }

        Some(info)
    }
}

fn is_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "string"
    )
}

/// Builder for [`EngineInfo`].
#[derive(Default)]
pub struct InfoBuilder {
    info: EngineInfo,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, d: u32) -> Self {
        self.info.depth = Some(d);
        self
    }

    pub fn seldepth(mut self, d: u32) -> Self {
        self.info.seldepth = Some(d);
        self
    }

    pub fn score_cp(mut self, cp: i32) -> Self {
        self.info.score = Some(Score::Cp(cp));
        self
    }

    pub fn score_mate(mut self, moves: i32) -> Self {
        self.info.score = Some(Score::Mate(moves));
        self
    }

    pub fn nodes(mut self, n: u64) -> Self {
        self.info.nodes = Some(n);
        self
    }

    pub fn nps(mut self, n: u64) -> Self {
        self.info.nps = Some(n);
        self
    }

    pub fn time(mut self, ms: u64) -> Self {
        self.info.time = Some(ms);
        self
    }

    pub fn pv(mut self, moves: Vec<String>) -> Self {
        self.info.pv = moves;
        self
    }

    pub fn currmove(mut self, mv: &str) -> Self {
        self.info.currmove = Some(mv.to_string());
        self
    }

    pub fn hashfull(mut self, permille: u32) -> Self {
        self.info.hashfull = Some(permille);
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        self.info.string = Some(s.to_string());
        self
    }

    pub fn extension(mut self, name: &str, value: ExtensionValue) -> Self {
        self.info.extension = Some((name.to_string(), value));
        self
    }

    pub fn build(self) -> EngineInfo {
        self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_formats() {
        let info = InfoBuilder::new()
            .depth(10)
            .score_cp(35)
            .nodes(50_000)
            .hashfull(12)
            .pv(vec!["e2e4".to_string(), "e7e5".to_string()])
            .build();

        let line = info.to_uci();
        assert!(line.starts_with("info "));
        assert!(line.contains("depth 10"));
        assert!(line.contains("score cp 35"));
        assert!(line.contains("nodes 50000"));
        assert!(line.contains("hashfull 12"));
        assert!(line.contains("pv e2e4 e7e5"));
    }

    #[test]
    fn parses_a_full_line() {
        let line = "info depth 12 score cp 30 nodes 125000 nps 500000 time 250 pv e2e4 e7e5 g1f3";
        let info = EngineInfo::parse(line).unwrap();
        assert_eq!(info.depth, Some(12));
        assert_eq!(info.score, Some(Score::Cp(30)));
        assert_eq!(info.nodes, Some(125_000));
        assert_eq!(info.nps, Some(500_000));
        assert_eq!(info.time, Some(250));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn parses_mate_scores() {
        let info = EngineInfo::parse("info depth 20 score mate 3 pv h7h8").unwrap();
        assert_eq!(info.score, Some(Score::Mate(3)));
        let info = EngineInfo::parse("info score mate -2").unwrap();
        assert_eq!(info.score, Some(Score::Mate(-2)));
    }

    #[test]
    fn non_info_lines_are_rejected() {
        assert!(EngineInfo::parse("bestmove e2e4").is_none());
    }

    #[test]
    fn extension_round_trip() {
        let info = InfoBuilder::new()
            .extension(
                "searchstats",
                ExtensionValue::object([
                    ("nodes", ExtensionValue::Int(12_345)),
                    ("driver", ExtensionValue::from("alphabeta")),
                ]),
            )
            .build();
        let line = info.to_uci();
        assert!(line.contains("string ext:searchstats"));

        let parsed = EngineInfo::parse(&line).unwrap();
        let (name, value) = parsed.extension.unwrap();
        assert_eq!(name, "searchstats");
        assert!(matches!(value, ExtensionValue::Object(_)));
    }
}
