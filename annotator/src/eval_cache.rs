use std::collections::HashMap;

use chess::Position;
use engine::{EngineError, Evaluation, Evaluator, SearchBudget};

/// Per-run memo in front of an evaluator, so detectors asking about the same
/// position with the same budget share one engine call. Failures are passed
/// through and not remembered.
pub struct CachedEvaluator<'a> {
    inner: &'a mut dyn Evaluator,
    memo: HashMap<(String, SearchBudget), Evaluation>,
    hits: usize,
    misses: usize,
}

impl<'a> CachedEvaluator<'a> {
    pub fn new(inner: &'a mut dyn Evaluator) -> Self {
        Self {
            inner,
            memo: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

impl Evaluator for CachedEvaluator<'_> {
    fn evaluate(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<Evaluation, EngineError> {
        let key = (position.fen(), budget);
        if let Some(evaluation) = self.memo.get(&key) {
            self.hits += 1;
            return Ok(*evaluation);
        }

        self.misses += 1;
        let evaluation = self.inner.evaluate(position, budget)?;
        tracing::trace!(fen = %key.0, %budget, score = %evaluation.score, "Evaluated");
        self.memo.insert(key, evaluation);
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::AnalysisScore;
    use engine::mock::ScriptedEvaluator;

    #[test]
    fn repeated_queries_reach_the_engine_once() {
        let mut inner = ScriptedEvaluator::new().with_default(AnalysisScore::Centipawns(12));
        {
            let mut cached = CachedEvaluator::new(&mut inner);
            let start = Position::startpos();
            for _ in 0..3 {
                let evaluation = cached.evaluate(&start, SearchBudget::Depth(10)).unwrap();
                assert_eq!(evaluation.score, AnalysisScore::Centipawns(12));
            }
            assert_eq!(cached.hits(), 2);
            assert_eq!(cached.misses(), 1);
        }
        assert_eq!(inner.calls().len(), 1);
    }

    #[test]
    fn budget_is_part_of_the_key() {
        let mut inner = ScriptedEvaluator::new().with_default(AnalysisScore::Centipawns(0));
        {
            let mut cached = CachedEvaluator::new(&mut inner);
            let start = Position::startpos();
            cached.evaluate(&start, SearchBudget::Depth(10)).unwrap();
            cached.evaluate(&start, SearchBudget::Depth(12)).unwrap();
        }
        assert_eq!(inner.calls().len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let mut inner = ScriptedEvaluator::new();
        {
            let mut cached = CachedEvaluator::new(&mut inner);
            let start = Position::startpos();
            assert!(cached.evaluate(&start, SearchBudget::Depth(1)).is_err());
            assert!(cached.evaluate(&start, SearchBudget::Depth(1)).is_err());
        }
        assert_eq!(inner.calls().len(), 2);
    }
}
