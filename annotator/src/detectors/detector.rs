use chess::{AnalysisScore, PieceColor, Position};
use engine::{EngineError, Evaluator, SearchBudget};
use serde::Serialize;
use serde_json::{json, Value};

use crate::board::AttackMap;
use crate::timeline::{mover_of, TimelineEntry};

/// Pre-computed context passed to every per-ply detector.
///
/// The attack map of the position after the move is built once per ply and
/// shared. Detectors only ever see immutable positions; lookahead happens on
/// copies.
pub struct PlyContext<'a> {
    pub entry: &'a TimelineEntry,
    /// Attack map for the *after* position.
    pub after_attacks: &'a AttackMap,
}

impl<'a> PlyContext<'a> {
    pub fn mover(&self) -> PieceColor {
        mover_of(self.entry)
    }

    pub fn before(&self) -> &'a Position {
        &self.entry.before
    }

    pub fn after(&self) -> &'a Position {
        &self.entry.after
    }
}

/// A detector that folds over the timeline one ply at a time and reports once
/// at the end.
pub trait PlyDetector {
    /// Key of this detector's result in the game report.
    fn name(&self) -> &'static str;

    /// Whether `observe` wants an evaluator.
    fn needs_engine(&self) -> bool {
        false
    }

    fn observe(&mut self, ctx: &PlyContext, engine: Option<&mut dyn Evaluator>);

    fn report(&self) -> Value;
}

/// Tracks whether an engine-dependent detector can still trust its results.
///
/// The first failure (or a missing evaluator) is remembered and later calls
/// are skipped; the detector then reports [`EngineStatus::unavailable`].
#[derive(Debug, Default, Clone)]
pub struct EngineStatus {
    failure: Option<String>,
}

impl EngineStatus {
    /// The evaluator to use for this ply, or `None` once degraded.
    pub fn usable<'e>(
        &mut self,
        detector: &'static str,
        engine: Option<&'e mut dyn Evaluator>,
    ) -> Option<&'e mut dyn Evaluator> {
        if self.failure.is_some() {
            return None;
        }
        match engine {
            Some(engine) => Some(engine),
            None => {
                self.degrade(detector, "no evaluator configured".to_string());
                None
            }
        }
    }

    pub fn record(&mut self, detector: &'static str, err: &EngineError) {
        self.degrade(detector, err.to_string());
    }

    fn degrade(&mut self, detector: &'static str, reason: String) {
        if self.failure.is_none() {
            tracing::warn!(detector, %reason, "Evaluation unavailable, detector degraded");
            self.failure = Some(reason);
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }

    pub fn reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// The neutral report of a degraded detector.
    pub fn unavailable(&self) -> Option<Value> {
        self.failure
            .as_ref()
            .map(|reason| json!({ "status": "evaluation unavailable", "reason": reason }))
    }
}

/// Score of `position` from `perspective`, in centipawns with mates folded to
/// `±mate_score_cp`. Positions without legal moves are scored by the rules.
pub fn sample_cp(
    engine: &mut dyn Evaluator,
    position: &Position,
    budget: SearchBudget,
    perspective: PieceColor,
    mate_score_cp: i32,
) -> Result<i32, EngineError> {
    if position.is_checkmate() {
        return Ok(if perspective == position.side_to_move() {
            -mate_score_cp
        } else {
            mate_score_cp
        });
    }
    if position.is_stalemate() {
        return Ok(0);
    }
    let score = engine.evaluate(position, budget)?.score_for(perspective);
    Ok(score.to_cp(mate_score_cp))
}

/// Centipawn score of `position` from `perspective`, or `None` when the
/// position is a forced mate either way. A stalemate is 0.
pub fn sample_centipawns(
    engine: &mut dyn Evaluator,
    position: &Position,
    budget: SearchBudget,
    perspective: PieceColor,
) -> Result<Option<i32>, EngineError> {
    if position.is_checkmate() {
        return Ok(None);
    }
    if position.is_stalemate() {
        return Ok(Some(0));
    }
    match engine.evaluate(position, budget)?.score_for(perspective) {
        AnalysisScore::Centipawns(cp) => Ok(Some(cp)),
        AnalysisScore::Mate(_) => Ok(None),
    }
}

/// One value per colour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BySide<T> {
    pub white: T,
    pub black: T,
}

impl<T> BySide<T> {
    pub fn get(&self, color: PieceColor) -> &T {
        match color {
            PieceColor::White => &self.white,
            PieceColor::Black => &self.black,
        }
    }

    pub fn get_mut(&mut self, color: PieceColor) -> &mut T {
        match color {
            PieceColor::White => &mut self.white,
            PieceColor::Black => &mut self.black,
        }
    }
}

/// A count with the records behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally<T> {
    pub count: usize,
    pub details: Vec<T>,
}

impl<T> Default for Tally<T> {
    fn default() -> Self {
        Self {
            count: 0,
            details: Vec::new(),
        }
    }
}

impl<T> Tally<T> {
    pub fn push(&mut self, item: T) {
        self.count += 1;
        self.details.push(item);
    }
}

/// Serialize a detector result; serialization of plain data cannot fail in practice.
pub fn to_report<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({ "status": "serialization failed", "reason": e.to_string() }))
}
