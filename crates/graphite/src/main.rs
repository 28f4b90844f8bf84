//! The Graphite engine binary.
//!
//! Reads UCI commands from stdin and writes protocol output to stdout;
//! logging goes to stderr so the protocol stream stays clean. Searches run
//! on a worker thread so `stop` can interrupt them through the shared stop
//! flag.

use anyhow::Context;
use clap::Parser;
use graphite_board::{generate_legal, Position};
use graphite_core::{Fen, Move};
use graphite_eval::Evaluator;
use graphite_search::probes::{consult, OpeningBook, Tablebase};
use graphite_search::tt::TranspositionTable;
use graphite_search::{
    alphabeta, mate_distance, mcts, EngineConfig, SearchDriver, SearchLimits, SearchReport,
    StopFlag,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use uci::{stdio_engine, EngineMessage, ExtensionValue, GoOptions, GuiCommand, InfoBuilder};

const ENGINE_NAME: &str = "Graphite";
const ENGINE_AUTHOR: &str = "Graphite developers";

#[derive(Parser)]
#[command(name = "graphite")]
#[command(about = "Graphite UCI chess engine")]
struct Args {
    /// Transposition table size in MiB
    #[arg(long, default_value_t = 128)]
    hash: usize,

    /// Search threads: Lazy SMP helpers for alpha-beta, workers for MCTS
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Answer `go` with the Monte-Carlo driver instead of alpha-beta
    #[arg(long)]
    mcts: bool,

    /// NNUE weight file; load failures fall back to the classical evaluator
    #[arg(long)]
    nnue: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Protocol output owns stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = EngineConfig {
        hash_mb: args.hash,
        threads: args.threads.max(1),
        driver: if args.mcts {
            SearchDriver::Mcts
        } else {
            SearchDriver::AlphaBeta
        },
    };

    let mut evaluator = Evaluator::new();
    if let Some(path) = &args.nnue {
        match evaluator.load_network(path) {
            Ok(()) => tracing::info!(?path, "nnue weights loaded"),
            Err(e) => tracing::warn!(?path, error = %e, "nnue load failed, using classical eval"),
        }
    }

    let tt = match TranspositionTable::new(config.hash_mb) {
        Ok(tt) => tt,
        Err(e) => {
            tracing::warn!(error = %e, "falling back to a minimal table");
            TranspositionTable::new(16).context("cannot allocate a transposition table")?
        }
    };

    let mut engine = Engine {
        config,
        evaluator: Arc::new(evaluator),
        tt: Arc::new(tt),
        position: Position::startpos(),
        stop: StopFlag::new(),
        search: None,
        book: None,
        tablebase: None,
    };
    engine.run()
}

struct Engine {
    config: EngineConfig,
    evaluator: Arc<Evaluator>,
    tt: Arc<TranspositionTable>,
    position: Position,
    stop: StopFlag,
    search: Option<JoinHandle<()>>,
    /// Opening book collaborator; none is bundled.
    book: Option<Box<dyn OpeningBook>>,
    /// Tablebase collaborator; none is bundled.
    tablebase: Option<Box<dyn Tablebase>>,
}

impl Engine {
    fn run(&mut self) -> anyhow::Result<()> {
        let mut io = stdio_engine();
        loop {
            let command = match io.read_command() {
                Ok(command) => command,
                Err(e) => {
                    report_error(&e.to_string());
                    continue;
                }
            };

            match command {
                GuiCommand::Uci => {
                    io.send_id(ENGINE_NAME, ENGINE_AUTHOR)?;
                    io.send_uciok()?;
                }
                GuiCommand::Extensions => {
                    io.send_extension("searchstats", "per-search statistics as JSON")?;
                    io.send_extensionsok()?;
                }
                GuiCommand::IsReady => {
                    io.send_readyok()?;
                }
                GuiCommand::Position { fen, moves } => {
                    self.set_position(fen.as_deref(), &moves);
                }
                GuiCommand::Go(opts) => {
                    self.start_search(limits_from(&opts));
                }
                GuiCommand::Stop => {
                    self.stop.stop();
                    self.finish_search();
                }
                GuiCommand::Quit => {
                    self.stop.stop();
                    self.finish_search();
                    return Ok(());
                }
                GuiCommand::Unknown(line) => {
                    if !line.is_empty() {
                        tracing::debug!(line, "ignoring unknown command");
                    }
                }
            }
        }
    }

    /// Applies a `position` command. Parse and legality errors discard the
    /// rest of the command but leave the engine serving.
    fn set_position(&mut self, fen: Option<&str>, moves: &[String]) {
        self.abort_search();

        if let Some(fen) = fen {
            if let Err(e) = self.position.set_from_fen(fen) {
                report_error(&format!("invalid fen: {}", e));
                return;
            }
        } else {
            self.position
                .set_from_fen(Fen::STARTPOS)
                .expect("startpos FEN is valid");
        }

        for text in moves {
            if let Err(message) = self.apply_move(text) {
                report_error(&message);
                return;
            }
        }
    }

    /// Matches a long-algebraic move string against the legal moves so the
    /// applied move carries the right flags.
    fn apply_move(&mut self, text: &str) -> Result<(), String> {
        let parsed =
            Move::from_uci(text).ok_or_else(|| format!("invalid move: '{}'", text))?;
        let legal = generate_legal(&mut self.position);
        let matched = legal.iter().find(|m| {
            m.from() == parsed.from()
                && m.to() == parsed.to()
                && m.flag().promotion() == parsed.flag().promotion()
        });
        match matched {
            Some(&mv) => {
                self.position.make_move(mv);
                Ok(())
            }
            None => Err(format!("invalid move: '{}' is not legal here", text)),
        }
    }

    /// Answers `go`: consults the book and tablebase, then hands the
    /// position to the configured driver on a worker thread.
    fn start_search(&mut self, limits: SearchLimits) {
        self.abort_search();
        self.stop.reset();

        if let Some(mv) = consult(
            self.book.as_deref(),
            self.tablebase.as_deref(),
            &self.position,
        ) {
            send(&EngineMessage::BestMove {
                mv: mv.to_uci(),
                ponder: None,
            });
            return;
        }

        let pos = self.position.clone();
        let evaluator = Arc::clone(&self.evaluator);
        let tt = Arc::clone(&self.tt);
        let config = self.config.clone();
        let stop = self.stop.clone();
        self.search = Some(std::thread::spawn(move || {
            run_search(pos, &evaluator, &tt, &config, limits, stop);
        }));
    }

    /// Waits for the running search (if any) to print its bestmove.
    fn finish_search(&mut self) {
        if let Some(handle) = self.search.take() {
            let _ = handle.join();
        }
    }

    /// Stops and joins any running search before mutating shared state.
    fn abort_search(&mut self) {
        if self.search.is_some() {
            self.stop.stop();
            self.finish_search();
        }
    }
}

/// The search worker: runs the driver, emits the statistics extension,
/// prints the bestmove.
fn run_search(
    pos: Position,
    evaluator: &Evaluator,
    tt: &TranspositionTable,
    config: &EngineConfig,
    limits: SearchLimits,
    stop: StopFlag,
) {
    let mut on_iteration = |report: &SearchReport| {
        let mut info = InfoBuilder::new()
            .depth(report.depth)
            .nodes(report.nodes)
            .time(report.elapsed_ms)
            .pv(report.pv.iter().map(|m| m.to_uci()).collect());
        info = match mate_distance(report.score) {
            Some(moves) => info.score_mate(moves),
            None => info.score_cp(report.score),
        };
        if report.elapsed_ms > 0 {
            info = info.nps(report.nodes * 1000 / report.elapsed_ms);
        }
        if let Some(permille) = report.hashfull {
            info = info.hashfull(permille);
        }
        send(&EngineMessage::Info(info.build()));
    };

    let result = match config.driver {
        SearchDriver::AlphaBeta => {
            alphabeta::search(&pos, evaluator, tt, config, &limits, &stop, &mut on_iteration)
        }
        SearchDriver::Mcts => {
            mcts::search(&pos, evaluator, config, &limits, &stop, &mut on_iteration)
        }
    };

    // A driver interrupted before any result still answers with some
    // legal move.
    let best = result.best_move.or_else(|| {
        let mut probe = pos.clone();
        generate_legal(&mut probe).as_slice().first().copied()
    });

    let driver = match config.driver {
        SearchDriver::AlphaBeta => "alphabeta",
        SearchDriver::Mcts => "mcts",
    };
    let stats = ExtensionValue::object([
        ("driver", ExtensionValue::from(driver)),
        ("nodes", ExtensionValue::from(result.nodes)),
        ("depth", ExtensionValue::Int(result.depth.into())),
        ("score", ExtensionValue::Int(result.score.into())),
        ("hashfull", ExtensionValue::from(i64::from(tt.hashfull()))),
    ]);
    send(&EngineMessage::Info(
        InfoBuilder::new().extension("searchstats", stats).build(),
    ));

    send(&EngineMessage::BestMove {
        mv: best.map(|m| m.to_uci()).unwrap_or_else(|| "0000".to_string()),
        ponder: None,
    });
}

fn limits_from(opts: &GoOptions) -> SearchLimits {
    SearchLimits {
        wtime: opts.wtime,
        btime: opts.btime,
        winc: opts.winc,
        binc: opts.binc,
        movestogo: opts.movestogo,
        movetime: opts.movetime,
        depth: opts.depth,
        nodes: opts.nodes,
        infinite: opts.infinite,
    }
}

/// Protocol output; one line per message.
fn send(msg: &EngineMessage) {
    println!("{}", msg.to_uci());
}

/// Errors surface as single-line info strings; the engine keeps serving.
fn report_error(message: &str) {
    send(&EngineMessage::Info(
        InfoBuilder::new().string(&format!("error: {}", message)).build(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine {
            config: EngineConfig::default(),
            evaluator: Arc::new(Evaluator::new()),
            tt: Arc::new(TranspositionTable::new(1).unwrap()),
            position: Position::startpos(),
            stop: StopFlag::new(),
            search: None,
            book: None,
            tablebase: None,
        }
    }

    #[test]
    fn position_with_moves_applies_flags() {
        let mut engine = engine();
        engine.set_position(None, &["e2e4".to_string(), "e7e5".to_string()]);
        assert_eq!(
            engine.position.to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2"
        );
    }

    #[test]
    fn illegal_move_stops_application() {
        let mut engine = engine();
        engine.set_position(None, &["e2e5".to_string(), "e7e5".to_string()]);
        // The bad move is rejected and the rest discarded.
        assert_eq!(engine.position.to_fen(), Fen::STARTPOS);
    }

    #[test]
    fn bad_fen_keeps_previous_position() {
        let mut engine = engine();
        engine.set_position(None, &["e2e4".to_string()]);
        let before = engine.position.to_fen();
        engine.set_position(Some("totally bogus"), &[]);
        assert_eq!(engine.position.to_fen(), before);
    }

    #[test]
    fn castling_move_string_matches_castle_flag() {
        let mut engine = engine();
        engine.set_position(
            Some("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1"),
            &["e1g1".to_string()],
        );
        assert!(engine.position.to_fen().starts_with("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R4RK1"));
    }

    #[test]
    fn promotion_move_string_matches_promotion() {
        let mut engine = engine();
        engine.set_position(Some("4k3/P7/8/8/8/8/8/4K3 w - - 0 1"), &["a7a8q".to_string()]);
        assert!(engine.position.to_fen().starts_with("Q3k3"));
    }

    #[test]
    fn limits_conversion_carries_everything() {
        let opts = GoOptions {
            movetime: Some(1),
            depth: Some(2),
            nodes: Some(3),
            wtime: Some(4),
            btime: Some(5),
            winc: Some(6),
            binc: Some(7),
            movestogo: Some(8),
            infinite: true,
        };
        let limits = limits_from(&opts);
        assert_eq!(limits.movetime, Some(1));
        assert_eq!(limits.depth, Some(2));
        assert_eq!(limits.nodes, Some(3));
        assert_eq!(limits.wtime, Some(4));
        assert_eq!(limits.btime, Some(5));
        assert_eq!(limits.winc, Some(6));
        assert_eq!(limits.binc, Some(7));
        assert_eq!(limits.movestogo, Some(8));
        assert!(limits.infinite);
    }
}
