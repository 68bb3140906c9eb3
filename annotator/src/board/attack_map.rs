use chess::{BitBoard, PieceColor, PieceKind, Position, Square};
use smallvec::SmallVec;

use super::helpers::{material_value, piece_attacks, pinned_to_king};

const MAX_ATTACKERS_PER_SQUARE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attacker {
    pub from: Square,
    pub piece: PieceKind,
}

/// Who attacks every square, per colour, plus which pieces are pinned to
/// their own king. Computed once per position and shared by all detectors.
#[derive(Debug, Clone)]
pub struct AttackMap {
    attacked_by_white: [SmallVec<[Attacker; MAX_ATTACKERS_PER_SQUARE]>; 64],
    attacked_by_black: [SmallVec<[Attacker; MAX_ATTACKERS_PER_SQUARE]>; 64],
    pinned_white: BitBoard,
    pinned_black: BitBoard,
}

impl AttackMap {
    pub fn compute(position: &Position) -> Self {
        let mut attack_map = Self {
            attacked_by_white: std::array::from_fn(|_| SmallVec::new()),
            attacked_by_black: std::array::from_fn(|_| SmallVec::new()),
            pinned_white: pinned_to_king(position, PieceColor::White),
            pinned_black: pinned_to_king(position, PieceColor::Black),
        };

        attack_map.populate_attacks(position);
        attack_map
    }

    pub fn attackers_of(&self, sq: Square, color: PieceColor) -> &[Attacker] {
        let idx = square_index(sq);
        match color {
            PieceColor::White => self.attacked_by_white[idx].as_slice(),
            PieceColor::Black => self.attacked_by_black[idx].as_slice(),
        }
    }

    pub fn is_attacked(&self, sq: Square, by: PieceColor) -> bool {
        !self.attackers_of(sq, by).is_empty()
    }

    /// Material value of the cheapest `color` piece attacking `sq`.
    pub fn cheapest_attacker(&self, sq: Square, color: PieceColor) -> Option<u8> {
        self.attackers_of(sq, color)
            .iter()
            .map(|a| material_value(a.piece))
            .min()
    }

    pub fn is_pinned(&self, sq: Square, color: PieceColor) -> bool {
        match color {
            PieceColor::White => self.pinned_white.has(sq),
            PieceColor::Black => self.pinned_black.has(sq),
        }
    }

    fn populate_attacks(&mut self, position: &Position) {
        for color in PieceColor::ALL {
            for kind in PieceKind::ALL {
                for from in position.pieces(kind, color) {
                    let attacker = Attacker { from, piece: kind };
                    for target in piece_attacks(position, from, kind, color) {
                        let idx = square_index(target);
                        match color {
                            PieceColor::White => self.attacked_by_white[idx].push(attacker),
                            PieceColor::Black => self.attacked_by_black[idx].push(attacker),
                        }
                    }
                }
            }
        }
    }
}

fn square_index(sq: Square) -> usize {
    (sq.rank() as usize * 8) + sq.file() as usize
}
