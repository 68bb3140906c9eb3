use chess::File;
use engine::Evaluator;
use serde::Serialize;
use serde_json::Value;

use super::detector::{to_report, BySide, PlyContext, PlyDetector};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Castling {
    Short,
    Long,
    #[default]
    #[serde(rename = "Not Castled")]
    NotCastled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SideSummary {
    pub castling: Castling,
    pub captures: usize,
    pub en_passant: usize,
    pub promotions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameSummary {
    pub total_plies: usize,
    /// Completed move pairs.
    pub total_moves: usize,
    #[serde(flatten)]
    pub sides: BySide<SideSummary>,
}

/// Basic per-game facts: length, castling, captures and promotions.
#[derive(Debug, Default)]
pub struct SummaryCollector {
    summary: GameSummary,
}

impl SummaryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> &GameSummary {
        &self.summary
    }
}

impl PlyDetector for SummaryCollector {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn observe(&mut self, ctx: &PlyContext, _engine: Option<&mut dyn Evaluator>) {
        let description = &ctx.entry.description;
        self.summary.total_plies += 1;
        self.summary.total_moves = self.summary.total_plies / 2;

        let side = self.summary.sides.get_mut(ctx.mover());
        if description.is_capture {
            side.captures += 1;
        }
        if description.is_en_passant {
            side.en_passant += 1;
        }
        if description.promotion.is_some() {
            side.promotions += 1;
        }
        if description.is_castling && side.castling == Castling::NotCastled {
            side.castling = if ctx.before().landing_square(description.mv).file() == File::G {
                Castling::Short
            } else {
                Castling::Long
            };
        }
    }

    fn report(&self) -> Value {
        to_report(&self.summary)
    }
}
