//! Evaluation oracle: a UCI engine behind a blocking `Evaluator` interface.

pub mod stockfish;
pub mod uci;

#[cfg(feature = "mock")]
pub mod mock;

pub use stockfish::{EngineConfig, StockfishEngine, StockfishEvaluator};
pub use uci::{UciError, UciMessage};

use std::time::Duration;

use chess::{AnalysisScore, PieceColor, Position};

/// How long the engine may search a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchBudget {
    Depth(u8),
    MoveTime(Duration),
}

impl SearchBudget {
    /// Arguments for the UCI `go` command.
    pub fn go_args(&self) -> String {
        match self {
            Self::Depth(depth) => format!("depth {}", depth),
            Self::MoveTime(time) => format!("movetime {}", time.as_millis()),
        }
    }
}

impl std::fmt::Display for SearchBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.go_args())
    }
}

/// A score for one position, always relative to `perspective` (the side to move).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub score: AnalysisScore,
    pub perspective: PieceColor,
    pub depth: Option<u8>,
}

impl Evaluation {
    /// The same score seen from `color`.
    pub fn score_for(&self, color: PieceColor) -> AnalysisScore {
        if color == self.perspective {
            self.score
        } else {
            self.score.negate()
        }
    }
}

/// Anything that can score a position. Calls block until the budget is spent.
pub trait Evaluator {
    fn evaluate(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<Evaluation, EngineError>;
}

impl<E: Evaluator + ?Sized> Evaluator for &mut E {
    fn evaluate(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<Evaluation, EngineError> {
        (**self).evaluate(position, budget)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<Evaluation, EngineError> {
        (**self).evaluate(position, budget)
    }
}

/// The parts of an `info` line the evaluator reads.
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub score: Option<AnalysisScore>,
    pub multipv: Option<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine binary not found")]
    NotFound,
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine protocol error: {0}")]
    Protocol(String),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("Engine returned no score for {0}")]
    NoScore(String),
    #[error("Engine closed its output")]
    Closed,
    #[error("Scripted failure: {0}")]
    Scripted(String),
}

impl From<UciError> for EngineError {
    fn from(err: UciError) -> Self {
        Self::Protocol(err.to_string())
    }
}
