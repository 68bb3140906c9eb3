//! Doubled and tripled pawn formations over the life of a game.
//!
//! A formation is identified by its sorted tuple of squares. Per colour, file
//! and size class at most one formation is tracked; it stays tracked until one
//! of its squares loses its pawn, and only then can a new formation on that
//! file be reported. Every formation ever reported is kept, deduplicated.

use std::collections::{BTreeMap, BTreeSet};

use chess::{BitBoard, File, PieceColor, PieceKind, Position, Square};
use engine::Evaluator;
use serde::Serialize;
use serde_json::Value;

use super::detector::{to_report, BySide, PlyContext, PlyDetector};
use crate::board::square_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormationKind {
    Doubled,
    Tripled,
}

impl FormationKind {
    const ALL: [FormationKind; 2] = [Self::Doubled, Self::Tripled];

    fn min_pawns(self) -> usize {
        match self {
            Self::Doubled => 2,
            Self::Tripled => 3,
        }
    }
}

/// Lifetime result for one colour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PawnFormations {
    pub doubled_count: usize,
    pub tripled_count: usize,
    pub doubled: BTreeSet<Vec<String>>,
    pub tripled: BTreeSet<Vec<String>>,
}

impl PawnFormations {
    fn record(&mut self, kind: FormationKind, squares: &[Square]) -> bool {
        let names = squares.iter().copied().map(square_name).collect();
        let (set, count) = match kind {
            FormationKind::Doubled => (&mut self.doubled, &mut self.doubled_count),
            FormationKind::Tripled => (&mut self.tripled, &mut self.tripled_count),
        };
        let inserted = set.insert(names);
        *count = set.len();
        inserted
    }
}

type TrackKey = (PieceColor, usize, FormationKind);

#[derive(Debug, Default)]
pub struct PawnStructureTracker {
    tracked: BTreeMap<TrackKey, Vec<Square>>,
    formations: BySide<PawnFormations>,
}

impl PawnStructureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn formations(&self) -> &BySide<PawnFormations> {
        &self.formations
    }

    /// Formations currently tracked, as square names.
    pub fn tracked(&self, color: PieceColor) -> Vec<(FormationKind, Vec<String>)> {
        self.tracked
            .iter()
            .filter(|((c, _, _), _)| *c == color)
            .map(|((_, _, kind), squares)| {
                (*kind, squares.iter().copied().map(square_name).collect())
            })
            .collect()
    }

    pub fn update(&mut self, position: &Position) {
        self.resolve(position);

        for color in PieceColor::ALL {
            let pawns = position.pieces(PieceKind::Pawn, color);
            for (file_idx, file) in File::ALL.into_iter().enumerate() {
                let squares: Vec<Square> = (pawns & file.bitboard()).into_iter().collect();
                for kind in FormationKind::ALL {
                    if squares.len() < kind.min_pawns() {
                        continue;
                    }
                    let key = (color, file_idx, kind);
                    if self.tracked.contains_key(&key) {
                        continue;
                    }
                    if self.formations.get_mut(color).record(kind, &squares) {
                        tracing::debug!(?color, ?kind, file = file_idx, "New pawn formation");
                    }
                    self.tracked.insert(key, squares.clone());
                }
            }
        }
    }

    /// Drop every tracked formation that lost a pawn.
    fn resolve(&mut self, position: &Position) {
        self.tracked.retain(|(color, _, _), squares| {
            let pawns: BitBoard = position.pieces(PieceKind::Pawn, *color);
            squares.iter().all(|&sq| pawns.has(sq))
        });
    }
}

impl PlyDetector for PawnStructureTracker {
    fn name(&self) -> &'static str {
        "pawn_structure"
    }

    fn observe(&mut self, ctx: &PlyContext, _engine: Option<&mut dyn Evaluator>) {
        self.update(ctx.after());
    }

    fn report(&self) -> Value {
        to_report(&self.formations)
    }
}
