use chess::PieceColor;
use engine::{Evaluator, SearchBudget};
use serde::Serialize;
use serde_json::Value;

use super::detector::{sample_centipawns, to_report, BySide, EngineStatus, PlyContext, PlyDetector, Tally};
use crate::config::AnnotatorConfig;

const NAME: &str = "zugzwang";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zugzwang {
    /// The position reached after this ply.
    pub ply: usize,
    /// Side to move, the side in zugzwang.
    pub color: PieceColor,
    pub fen: String,
    pub baseline_cp: i32,
    /// Best centipawn score any legal move reached at the trial budget;
    /// `None` when every trial was a forced mate.
    pub best_trial_cp: Option<i32>,
}

/// Flags positions where every legal move scores strictly below the side to
/// move's baseline evaluation. Only centipawn scores take part: a baseline
/// that is a forced mate is never a zugzwang, and mate trials are ignored.
#[derive(Debug)]
pub struct ZugzwangDetector {
    margin_cp: i32,
    baseline: SearchBudget,
    trial: SearchBudget,
    found: BySide<Tally<Zugzwang>>,
    status: EngineStatus,
}

impl ZugzwangDetector {
    pub fn new(config: &AnnotatorConfig) -> Self {
        Self {
            margin_cp: config.zugzwang_margin_cp,
            baseline: config.zugzwang_baseline_budget.budget(),
            trial: config.zugzwang_trial_budget.budget(),
            found: BySide::default(),
            status: EngineStatus::default(),
        }
    }

    pub fn found(&self) -> &BySide<Tally<Zugzwang>> {
        &self.found
    }

    fn probe(&mut self, ctx: &PlyContext, engine: &mut dyn Evaluator) {
        let position = ctx.after();
        let side = position.side_to_move();
        let successors = position.successors();
        if successors.is_empty() {
            return;
        }

        let baseline_cp = match sample_centipawns(engine, position, self.baseline, side) {
            Ok(Some(cp)) => cp,
            Ok(None) => return,
            Err(e) => return self.status.record(NAME, &e),
        };
        let bar = baseline_cp - self.margin_cp;

        let mut best_trial_cp: Option<i32> = None;
        for (_, next) in &successors {
            let trial_cp = match sample_centipawns(engine, next, self.trial, side) {
                Ok(Some(cp)) => cp,
                Ok(None) => continue,
                Err(e) => return self.status.record(NAME, &e),
            };
            if trial_cp >= bar {
                return;
            }
            best_trial_cp = Some(best_trial_cp.map_or(trial_cp, |best| best.max(trial_cp)));
        }

        tracing::debug!(ply = ctx.entry.ply, ?side, baseline_cp, ?best_trial_cp, "Zugzwang");
        self.found.get_mut(side).push(Zugzwang {
            ply: ctx.entry.ply,
            color: side,
            fen: position.fen(),
            baseline_cp,
            best_trial_cp,
        });
    }
}

impl PlyDetector for ZugzwangDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn needs_engine(&self) -> bool {
        true
    }

    fn observe(&mut self, ctx: &PlyContext, engine: Option<&mut dyn Evaluator>) {
        if let Some(engine) = self.status.usable(NAME, engine) {
            self.probe(ctx, engine);
        }
    }

    fn report(&self) -> Value {
        self.status
            .unavailable()
            .unwrap_or_else(|| to_report(&self.found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{AnalysisScore, Position};
    use engine::mock::ScriptedEvaluator;

    use crate::board::AttackMap;
    use crate::timeline::Timeline;

    // King and pawn ending, black to move after Ke3.
    const FEN: &str = "8/8/8/2kp4/8/3K4/8/8 w - - 0 1";

    fn probe(engine: &mut ScriptedEvaluator) -> ZugzwangDetector {
        probe_move(FEN, "Ke3", engine)
    }

    fn probe_move(fen: &str, san: &str, engine: &mut ScriptedEvaluator) -> ZugzwangDetector {
        let timeline = Timeline::replay_san(Position::from_fen(fen).unwrap(), &[san]).unwrap();
        let mut detector = ZugzwangDetector::new(&AnnotatorConfig::default());
        let entry = &timeline.entries()[0];
        let map = AttackMap::compute(&entry.after);
        let ctx = PlyContext {
            entry,
            after_attacks: &map,
        };
        detector.observe(&ctx, Some(engine));
        detector
    }

    fn after_ke3() -> Position {
        let start = Position::from_fen(FEN).unwrap();
        start.play(start.parse_san("Ke3").unwrap()).unwrap()
    }

    #[test]
    fn every_move_worse_is_zugzwang() {
        let position = after_ke3();
        // Black to move at 0; every black move leaves white (to move) at +200.
        let mut engine = ScriptedEvaluator::new()
            .with_default(AnalysisScore::Centipawns(200))
            .with_score(position.fen(), AnalysisScore::Centipawns(0));

        let detector = probe(&mut engine);
        let black = &detector.found().black;
        assert_eq!(black.count, 1);
        assert_eq!(black.details[0].baseline_cp, 0);
        assert_eq!(black.details[0].best_trial_cp, Some(-200));
        assert_eq!(detector.found().white.count, 0);
        assert_eq!(
            engine.calls().len(),
            position.legal_moves().len() + 1,
            "baseline plus one trial per move"
        );
    }

    #[test]
    fn one_equal_move_breaks_zugzwang() {
        let position = after_ke3();
        let (_, holding) = position.successors().remove(0);
        let mut engine = ScriptedEvaluator::new()
            .with_default(AnalysisScore::Centipawns(200))
            .with_score(position.fen(), AnalysisScore::Centipawns(0));
        engine.set_score(&holding, AnalysisScore::Centipawns(0));

        let detector = probe(&mut engine);
        assert_eq!(detector.found().black.count, 0);
        assert_eq!(engine.calls().len(), 2, "the first trial already holds");
    }

    #[test]
    fn side_with_a_forced_mate_is_not_in_zugzwang() {
        // After ...Kh8 white has Ra8#; the engine reports mate in one.
        let fen = "6k1/5ppp/8/8/8/8/8/R6K b - - 0 1";
        let start = Position::from_fen(fen).unwrap();
        let after = start.play(start.parse_san("Kh8").unwrap()).unwrap();
        let mut engine = ScriptedEvaluator::new()
            .with_default(AnalysisScore::Centipawns(900))
            .with_score(after.fen(), AnalysisScore::Mate(1));

        let detector = probe_move(fen, "Kh8", &mut engine);
        assert_eq!(detector.found(), &BySide::default());
        assert_eq!(engine.calls().len(), 1, "no trials after a mate baseline");
    }

    #[test]
    fn mate_trials_do_not_break_zugzwang() {
        let position = after_ke3();
        let (_, mating) = position.successors().remove(0);
        let mut engine = ScriptedEvaluator::new()
            .with_default(AnalysisScore::Centipawns(200))
            .with_score(position.fen(), AnalysisScore::Centipawns(0));
        // White to move and getting mated: a winning line for black, but not a centipawn score.
        engine.set_score(&mating, AnalysisScore::Mate(-3));

        let detector = probe(&mut engine);
        let black = &detector.found().black;
        assert_eq!(black.count, 1);
        assert_eq!(black.details[0].best_trial_cp, Some(-200));
        assert_eq!(engine.calls().len(), position.legal_moves().len() + 1);
    }

    #[test]
    fn trials_use_the_shallower_budget() {
        let position = after_ke3();
        let mut engine = ScriptedEvaluator::new()
            .with_default(AnalysisScore::Centipawns(0))
            .with_score(position.fen(), AnalysisScore::Centipawns(0));
        probe(&mut engine);

        let config = AnnotatorConfig::default();
        assert_eq!(engine.calls()[0].1, config.zugzwang_baseline_budget.budget());
        assert_eq!(engine.calls()[1].1, config.zugzwang_trial_budget.budget());
    }

    #[test]
    fn missing_engine_reports_unavailable() {
        let timeline = Timeline::replay_san(Position::from_fen(FEN).unwrap(), &["Ke3"]).unwrap();
        let mut detector = ZugzwangDetector::new(&AnnotatorConfig::default());
        let entry = &timeline.entries()[0];
        let map = AttackMap::compute(&entry.after);
        let ctx = PlyContext {
            entry,
            after_attacks: &map,
        };
        detector.observe(&ctx, None);
        assert_eq!(detector.report()["status"], "evaluation unavailable");
    }
}
