use chess::{File, PieceColor, Square};
use engine::Evaluator;
use serde::Serialize;
use serde_json::Value;

use super::detector::{to_report, BySide, PlyContext, PlyDetector};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckCounts {
    pub checks: usize,
    pub double_checks: usize,
    pub discovered_checks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredCheck {
    pub ply: usize,
    pub color: PieceColor,
    pub san: String,
    pub uci: String,
    /// Square of the piece whose line was opened.
    pub checker: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    #[serde(flatten)]
    pub counts: BySide<CheckCounts>,
    pub discovered_check_moves: Vec<DiscoveredCheck>,
}

/// Classifies every checking move as a check, a double check and/or a
/// discovered check, credited to the side that moved.
#[derive(Debug, Default)]
pub struct CheckDetector {
    report: CheckReport,
}

impl CheckDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result(&self) -> &CheckReport {
        &self.report
    }
}

impl PlyDetector for CheckDetector {
    fn name(&self) -> &'static str {
        "checks"
    }

    fn observe(&mut self, ctx: &PlyContext, _engine: Option<&mut dyn Evaluator>) {
        let after = ctx.after();
        if !after.is_check() {
            return;
        }

        let mover = ctx.mover();
        let king = after.king(!mover);
        let counts = self.report.counts.get_mut(mover);
        counts.checks += 1;

        if after.checkers().len() >= 2 {
            counts.double_checks += 1;
        }

        if let Some(checker) = discovering_piece(ctx, king) {
            counts.discovered_checks += 1;
            tracing::debug!(ply = ctx.entry.ply, san = %ctx.entry.description.san, "Discovered check");
            self.report.discovered_check_moves.push(DiscoveredCheck {
                ply: ctx.entry.ply,
                color: mover,
                san: ctx.entry.description.san.clone(),
                uci: ctx.entry.description.uci.clone(),
                checker: chess::format_square(checker),
            });
        }
    }

    fn report(&self) -> Value {
        to_report(&self.report)
    }
}

/// A slider, other than the moved piece, whose line to `king` the move opened.
/// The side to move can never already be giving check, so every checker is new.
fn discovering_piece(ctx: &PlyContext, king: Square) -> Option<Square> {
    let before = ctx.before();
    let after = ctx.after();
    let mv = ctx.entry.mv;

    let landing = before.landing_square(mv);
    let mut vacated = mv.from.bitboard();
    let mut moved_to = landing.bitboard();
    if let Some(victim) = before.en_passant_victim(mv) {
        vacated |= victim.bitboard();
    }
    if before.is_castling(mv) {
        vacated |= mv.to.bitboard();
        moved_to |= castled_rook_square(landing).bitboard();
    }

    after.checkers().into_iter().find(|&checker| {
        let is_slider = after
            .piece_at(checker)
            .is_some_and(|(kind, _)| kind.is_slider());
        is_slider
            && !moved_to.has(checker)
            && !(cozy_chess::get_between_rays(checker, king) & vacated).is_empty()
    })
}

/// The castling rook ends next to the king, on the side it came from.
fn castled_rook_square(king_to: Square) -> Square {
    let file = if king_to.file() == File::G { File::F } else { File::D };
    Square::new(file, king_to.rank())
}
