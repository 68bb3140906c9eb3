use chess::{BitBoard, PieceColor, PieceKind, Position, Square};
use cozy_chess::{Color, Piece};

/// Classical material values: P1 N3 B3 R5 Q9. The king is worth 0 because it
/// can never be exchanged.
pub fn material_value(kind: PieceKind) -> u8 {
    match kind {
        PieceKind::Pawn => 1,
        PieceKind::Knight | PieceKind::Bishop => 3,
        PieceKind::Rook => 5,
        PieceKind::Queen => 9,
        PieceKind::King => 0,
    }
}

/// Returns the attack bitboard for a specific piece on a square.
pub fn piece_attacks(position: &Position, sq: Square, kind: PieceKind, color: PieceColor) -> BitBoard {
    let occupied = position.occupied();
    match Piece::from(kind) {
        Piece::Pawn => cozy_chess::get_pawn_attacks(sq, Color::from(color)),
        Piece::Knight => cozy_chess::get_knight_moves(sq),
        Piece::Bishop => cozy_chess::get_bishop_moves(sq, occupied),
        Piece::Rook => cozy_chess::get_rook_moves(sq, occupied),
        Piece::Queen => {
            cozy_chess::get_bishop_moves(sq, occupied) | cozy_chess::get_rook_moves(sq, occupied)
        }
        Piece::King => cozy_chess::get_king_moves(sq),
    }
}

/// Pieces of `color` that may not leave their line because an enemy slider
/// would then attack their king.
pub fn pinned_to_king(position: &Position, color: PieceColor) -> BitBoard {
    let king = position.king(color);
    let enemy = !color;
    let occupied = position.occupied();
    let ours = position.colors(color);

    let queens = position.pieces(PieceKind::Queen, enemy);
    let diagonal = (position.pieces(PieceKind::Bishop, enemy) | queens) & cozy_chess::get_bishop_rays(king);
    let orthogonal = (position.pieces(PieceKind::Rook, enemy) | queens) & cozy_chess::get_rook_rays(king);

    let mut pinned = BitBoard::EMPTY;
    for slider in diagonal | orthogonal {
        let between = cozy_chess::get_between_rays(slider, king) & occupied;
        if between.len() == 1 && !(between & ours).is_empty() {
            pinned |= between;
        }
    }
    pinned
}

pub fn square_name(sq: Square) -> String {
    chess::format_square(sq)
}
