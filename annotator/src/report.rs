//! Runs every analysis over a replayed game and collects the results.

use std::collections::BTreeMap;

use chess::{Move, Position};
use engine::Evaluator;
use serde_json::{json, Value};

use crate::board::AttackMap;
use crate::config::AnnotatorConfig;
use crate::detectors::{build_detectors, to_report, PlyContext};
use crate::error::Result;
use crate::eval_cache::CachedEvaluator;
use crate::opening::OpeningCatalog;
use crate::termination::{adjudicate, GameOutcome};
use crate::timeline::Timeline;

/// Analysis name to result. Sorted keys keep serialised reports stable.
pub type GameReport = BTreeMap<String, Value>;

pub struct Annotator {
    config: AnnotatorConfig,
    catalog: OpeningCatalog,
}

impl Annotator {
    pub fn new(config: AnnotatorConfig, catalog: OpeningCatalog) -> Self {
        Self { config, catalog }
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &OpeningCatalog {
        &self.catalog
    }

    /// Replay `moves` from `start` and annotate the game. An illegal move is
    /// reported before any analysis runs.
    pub fn annotate_moves(
        &self,
        start: Position,
        moves: &[Move],
        result: &str,
        engine: Option<&mut dyn Evaluator>,
    ) -> Result<GameReport> {
        let timeline = Timeline::replay(start, moves)?;
        Ok(self.annotate(&timeline, result, engine))
    }

    #[tracing::instrument(skip_all, fields(plies = timeline.len(), result = %result))]
    pub fn annotate(
        &self,
        timeline: &Timeline,
        result: &str,
        engine: Option<&mut dyn Evaluator>,
    ) -> GameReport {
        tracing::info!(plies = timeline.len(), result, "Annotating game");

        let mut cached = engine.map(CachedEvaluator::new);
        let mut detectors = build_detectors(&self.config);

        for entry in timeline {
            let after_attacks = AttackMap::compute(&entry.after);
            let ctx = PlyContext {
                entry,
                after_attacks: &after_attacks,
            };
            for detector in detectors.iter_mut() {
                let engine = if detector.needs_engine() {
                    cached.as_mut().map(|c| c as &mut dyn Evaluator)
                } else {
                    None
                };
                detector.observe(&ctx, engine);
            }
        }

        let mut report = GameReport::new();
        for detector in &detectors {
            report.insert(detector.name().to_string(), detector.report());
        }
        if !self.config.enable_zwischenzug {
            report.insert("zwischenzug".to_string(), disabled());
        }
        if !self.config.enable_zugzwang {
            report.insert("zugzwang".to_string(), disabled());
        }

        let opening = self.catalog.matches(&timeline.uci_moves());
        report.insert("opening".to_string(), to_report(&opening));

        let outcome = GameOutcome::parse(result);
        let termination = adjudicate(
            timeline,
            &outcome,
            &self.config,
            cached.as_mut().map(|c| c as &mut dyn Evaluator),
        );
        report.insert("termination".to_string(), to_report(&termination));

        if let Some(cached) = &cached {
            tracing::debug!(hits = cached.hits(), misses = cached.misses(), "Evaluation cache");
        }
        tracing::info!(plies = timeline.len(), opening = %opening.name, "Annotation finished");
        report
    }
}

fn disabled() -> Value {
    json!({ "status": "disabled" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::AnalysisScore;
    use engine::mock::ScriptedEvaluator;

    fn italian() -> Timeline {
        Timeline::replay_san(
            Position::startpos(),
            &["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"],
        )
        .unwrap()
    }

    fn quiet_config() -> AnnotatorConfig {
        AnnotatorConfig {
            enable_zwischenzug: false,
            enable_zugzwang: false,
            ..AnnotatorConfig::default()
        }
    }

    #[test]
    fn report_has_every_analysis_key() {
        let annotator = Annotator::new(AnnotatorConfig::default(), OpeningCatalog::new());
        let report = annotator.annotate(&italian(), "1/2-1/2", None);

        let keys: Vec<&str> = report.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "checks",
                "forks",
                "material_threats",
                "opening",
                "pawn_structure",
                "summary",
                "termination",
                "zugzwang",
                "zwischenzug",
            ]
        );
        assert_eq!(report["opening"]["name"], "Unknown");
        assert_eq!(report["termination"]["draw_type"], "Agreement");
    }

    #[test]
    fn without_engine_only_evaluation_analyses_degrade() {
        let annotator = Annotator::new(AnnotatorConfig::default(), OpeningCatalog::new());
        let report = annotator.annotate(&italian(), "1-0", None);

        assert_eq!(report["zwischenzug"]["status"], "evaluation unavailable");
        assert_eq!(report["zugzwang"]["status"], "evaluation unavailable");
        assert_eq!(report["summary"]["total_moves"], 3);
        assert_eq!(report["termination"]["resignation"]["verdict"], "Unavailable");
    }

    #[test]
    fn disabled_analyses_are_marked() {
        let annotator = Annotator::new(quiet_config(), OpeningCatalog::new());
        let report = annotator.annotate(&italian(), "*", None);
        assert_eq!(report["zwischenzug"], json!({ "status": "disabled" }));
        assert_eq!(report["zugzwang"], json!({ "status": "disabled" }));
    }

    #[test]
    fn shared_positions_are_evaluated_once() {
        let mut engine = ScriptedEvaluator::new().with_default(AnalysisScore::Centipawns(0));
        let config = AnnotatorConfig {
            enable_zugzwang: false,
            ..AnnotatorConfig::default()
        };
        let annotator = Annotator::new(config, OpeningCatalog::new());
        annotator.annotate(&italian(), "*", Some(&mut engine));

        let mut seen = std::collections::HashSet::new();
        for call in engine.calls() {
            assert!(seen.insert(call.clone()), "duplicate engine query {call:?}");
        }
    }

    #[test]
    fn illegal_move_is_reported_before_analysis() {
        let annotator = Annotator::new(quiet_config(), OpeningCatalog::new());
        let bad: Move = "e2e5".parse().unwrap();
        let err = annotator
            .annotate_moves(Position::startpos(), &[bad], "*", None)
            .unwrap_err();
        assert!(matches!(err, crate::AnnotatorError::IllegalMove { ply: 1, .. }));
    }
}
