use std::collections::BTreeSet;

use chess::{Move, PieceColor, Position};
use engine::{Evaluator, SearchBudget};
use serde::Serialize;
use serde_json::Value;

use super::detector::{sample_cp, to_report, BySide, EngineStatus, PlyContext, PlyDetector, Tally};
use crate::config::AnnotatorConfig;

const NAME: &str = "zwischenzug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZwischenzugType {
    Check,
    Capture,
    MateThreat,
    ThreatensCapture,
}

/// A reply that moved the mover's evaluation past the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwingingReply {
    pub reply: String,
    pub reply_uci: String,
    pub after_cp: i32,
    pub delta_cp: i32,
    pub types: BTreeSet<ZwischenzugType>,
}

/// One flagged move. Every swinging reply is listed, and `types` is their union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zwischenzug {
    pub ply: usize,
    /// Side that played the original move.
    pub color: PieceColor,
    pub san: String,
    /// Mover's score before any reply.
    pub before_cp: i32,
    pub replies: Vec<SwingingReply>,
    pub types: BTreeSet<ZwischenzugType>,
}

/// For every reply to a move, compares the mover's evaluation before and
/// after the reply. A move is flagged once when any reply swings it past the
/// threshold.
#[derive(Debug)]
pub struct ZwischenzugDetector {
    threshold_cp: i32,
    mate_score_cp: i32,
    budget: SearchBudget,
    found: BySide<Tally<Zwischenzug>>,
    status: EngineStatus,
}

impl ZwischenzugDetector {
    pub fn new(config: &AnnotatorConfig) -> Self {
        Self {
            threshold_cp: config.zwischenzug_threshold_cp,
            mate_score_cp: config.mate_score_cp,
            budget: config.zwischenzug_budget.budget(),
            found: BySide::default(),
            status: EngineStatus::default(),
        }
    }

    pub fn found(&self) -> &BySide<Tally<Zwischenzug>> {
        &self.found
    }

    fn scan(&mut self, ctx: &PlyContext, engine: &mut dyn Evaluator) {
        let mover = ctx.mover();
        let after = ctx.after();
        if !after.has_legal_moves() {
            return;
        }

        let before_cp = match sample_cp(engine, after, self.budget, mover, self.mate_score_cp) {
            Ok(cp) => cp,
            Err(e) => return self.status.record(NAME, &e),
        };

        let mut replies = Vec::new();
        for (reply, next) in after.successors() {
            let after_cp = match sample_cp(engine, &next, self.budget, mover, self.mate_score_cp) {
                Ok(cp) => cp,
                Err(e) => return self.status.record(NAME, &e),
            };
            let delta_cp = after_cp - before_cp;
            if delta_cp.abs() <= self.threshold_cp {
                continue;
            }
            replies.push(SwingingReply {
                reply: after.san(reply),
                reply_uci: after.uci(reply),
                after_cp,
                delta_cp,
                types: classify_reply(after, reply, &next),
            });
        }
        if replies.is_empty() {
            return;
        }

        let types = replies.iter().flat_map(|r| r.types.iter().copied()).collect();
        tracing::debug!(ply = ctx.entry.ply, replies = replies.len(), "Zwischenzug");
        self.found.get_mut(mover).push(Zwischenzug {
            ply: ctx.entry.ply,
            color: mover,
            san: ctx.entry.description.san.clone(),
            before_cp,
            replies,
            types,
        });
    }
}

impl PlyDetector for ZwischenzugDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn needs_engine(&self) -> bool {
        true
    }

    fn observe(&mut self, ctx: &PlyContext, engine: Option<&mut dyn Evaluator>) {
        if let Some(engine) = self.status.usable(NAME, engine) {
            self.scan(ctx, engine);
        }
    }

    fn report(&self) -> Value {
        self.status
            .unavailable()
            .unwrap_or_else(|| to_report(&self.found))
    }
}

/// What the reply does. A reply that is none of check, capture or mate
/// threat is taken to threaten a capture.
pub fn classify_reply(position: &Position, reply: Move, next: &Position) -> BTreeSet<ZwischenzugType> {
    let mut types = BTreeSet::new();
    if next.is_check() {
        types.insert(ZwischenzugType::Check);
    }
    if position.is_capture(reply) {
        types.insert(ZwischenzugType::Capture);
    }
    if threatens_mate(next) {
        types.insert(ZwischenzugType::MateThreat);
    }
    if types.is_empty() {
        types.insert(ZwischenzugType::ThreatensCapture);
    }
    types
}

/// The side that just moved would mate in one if it could move again.
fn threatens_mate(position: &Position) -> bool {
    position.null_move().is_some_and(|passed| {
        passed
            .legal_moves()
            .into_iter()
            .any(|mv| passed.gives_mate(mv))
    })
}
