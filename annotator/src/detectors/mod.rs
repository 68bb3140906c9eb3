pub mod check_detector;
pub mod detector;
pub mod fork_detector;
pub mod pawn_structure;
pub mod summary;
pub mod threat_detector;
pub mod zugzwang_detector;
pub mod zwischenzug_detector;

pub use check_detector::{CheckCounts, CheckDetector, CheckReport, DiscoveredCheck};
pub use detector::{sample_centipawns, sample_cp, to_report, BySide, EngineStatus, PlyContext, PlyDetector, Tally};
pub use fork_detector::{CounterFork, ForkCandidate, ForkDetector, ForkPolicy, ForkTarget};
pub use pawn_structure::{FormationKind, PawnFormations, PawnStructureTracker};
pub use summary::{Castling, GameSummary, SideSummary, SummaryCollector};
pub use threat_detector::{MaterialThreat, ThreatDetector, ThreatenedPiece};
pub use zugzwang_detector::{Zugzwang, ZugzwangDetector};
pub use zwischenzug_detector::{SwingingReply, Zwischenzug, ZwischenzugDetector, ZwischenzugType};

use crate::config::AnnotatorConfig;

/// Every per-ply detector enabled by `config`, in report order.
pub fn build_detectors(config: &AnnotatorConfig) -> Vec<Box<dyn PlyDetector>> {
    let mut detectors: Vec<Box<dyn PlyDetector>> = vec![
        Box::new(SummaryCollector::new()),
        Box::new(CheckDetector::new()),
        Box::new(ForkDetector::new(config.fork_policy)),
        Box::new(PawnStructureTracker::new()),
        Box::new(ThreatDetector::new(config)),
    ];
    if config.enable_zwischenzug {
        detectors.push(Box::new(ZwischenzugDetector::new(config)));
    }
    if config.enable_zugzwang {
        detectors.push(Box::new(ZugzwangDetector::new(config)));
    }
    detectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_detectors_are_left_out() {
        let config = AnnotatorConfig {
            enable_zugzwang: false,
            ..AnnotatorConfig::default()
        };
        let names: Vec<&str> = build_detectors(&config).iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec!["summary", "checks", "forks", "pawn_structure", "material_threats", "zwischenzug"]
        );
    }

    #[test]
    fn only_evaluation_detectors_need_the_engine() {
        let detectors = build_detectors(&AnnotatorConfig::default());
        let needing: Vec<&str> = detectors
            .iter()
            .filter(|d| d.needs_engine())
            .map(|d| d.name())
            .collect();
        assert_eq!(needing, vec!["material_threats", "zwischenzug", "zugzwang"]);
    }
}
