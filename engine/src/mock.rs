//! Scripted evaluator for deterministic tests.

use std::collections::HashMap;

use chess::{AnalysisScore, Position};

use crate::{EngineError, Evaluation, Evaluator, SearchBudget};

/// Answers from a FEN-keyed score table. Scores are from the side to move.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvaluator {
    scores: HashMap<String, AnalysisScore>,
    default: Option<AnalysisScore>,
    failure: Option<String>,
    calls: Vec<(String, SearchBudget)>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score returned for positions missing from the table; without one they fail with `NoScore`.
    pub fn with_default(mut self, score: AnalysisScore) -> Self {
        self.default = Some(score);
        self
    }

    pub fn with_score(mut self, fen: impl Into<String>, score: AnalysisScore) -> Self {
        self.scores.insert(key(&fen.into()), score);
        self
    }

    pub fn set_score(&mut self, position: &Position, score: AnalysisScore) {
        self.scores.insert(key(&position.fen()), score);
    }

    /// Every call fails with `EngineError::Scripted(reason)`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// FEN and budget of every call, in order.
    pub fn calls(&self) -> &[(String, SearchBudget)] {
        &self.calls
    }
}

impl Evaluator for ScriptedEvaluator {
    fn evaluate(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<Evaluation, EngineError> {
        let fen = position.fen();
        self.calls.push((fen.clone(), budget));

        if let Some(reason) = &self.failure {
            return Err(EngineError::Scripted(reason.clone()));
        }

        let score = self
            .scores
            .get(&key(&fen))
            .copied()
            .or(self.default)
            .ok_or(EngineError::NoScore(fen))?;

        Ok(Evaluation {
            score,
            perspective: position.side_to_move(),
            depth: None,
        })
    }
}

/// Placement, side, castling and en passant; move counters are ignored.
fn key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}
