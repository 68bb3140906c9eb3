//! UCI (Universal Chess Interface) move notation

use cozy_chess::{File, Move, Piece, Rank, Square};

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// This function checks if the move is a castling move and converts it to the
/// appropriate cozy_chess format by finding the matching legal move.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_rank_1_or_8 = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if is_rank_1_or_8 && is_e_file && is_g_or_c_file && mv.promotion.is_none() {
        let target_square = match (mv.from.rank(), mv.to.file()) {
            (Rank::First, File::G) => Square::new(File::H, Rank::First),
            (Rank::First, File::C) => Square::new(File::A, Rank::First),
            (Rank::Eighth, File::G) => Square::new(File::H, Rank::Eighth),
            (Rank::Eighth, File::C) => Square::new(File::A, Rank::Eighth),
            _ => return mv,
        };

        let converted = Move {
            from: mv.from,
            to: target_square,
            promotion: None,
        };

        // A plain king step to g1/c1 is also legal in some positions; only
        // rewrite when the king-takes-rook form is what the board accepts.
        if legal_moves.contains(&converted) && !legal_moves.contains(&mv) {
            return converted;
        }
    }

    mv
}

/// Format a move in raw UCI notation (e.g., "e2e4", "e7e8q").
///
/// Castling is printed the way cozy-chess encodes it (king takes rook); use
/// `Position::uci` for the standard king-two-squares form.
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}

/// Parse UCI move format (e2e4, e7e8q) without consulting a board.
pub fn parse_uci_move(s: &str) -> Result<Move, UciMoveError> {
    let s = s.trim();
    if !(4..=5).contains(&s.len()) || !s.is_ascii() {
        return Err(UciMoveError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2])?;
    let to = parse_square(&s[2..4])?;

    let promotion = if s.len() == 5 {
        Some(match &s[4..5] {
            "q" => Piece::Queen,
            "r" => Piece::Rook,
            "b" => Piece::Bishop,
            "n" => Piece::Knight,
            _ => return Err(UciMoveError::InvalidPromotion(s.to_string())),
        })
    } else {
        None
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

pub fn parse_square(s: &str) -> Result<Square, UciMoveError> {
    let mut chars = s.chars();
    let (Some(file_char), Some(rank_char), None) = (chars.next(), chars.next(), chars.next())
    else {
        return Err(UciMoveError::InvalidSquare(s.to_string()));
    };

    let file = file_from_char(file_char).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;
    let rank = rank_from_char(rank_char).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;

    Ok(Square::new(file, rank))
}

pub fn format_square(sq: Square) -> String {
    format!("{}{}", file_to_char(sq.file()), rank_to_char(sq.rank()))
}

pub fn file_to_char(file: File) -> char {
    match file {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    }
}

pub fn rank_to_char(rank: Rank) -> char {
    match rank {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    }
}

pub fn file_from_char(c: char) -> Option<File> {
    match c {
        'a' => Some(File::A),
        'b' => Some(File::B),
        'c' => Some(File::C),
        'd' => Some(File::D),
        'e' => Some(File::E),
        'f' => Some(File::F),
        'g' => Some(File::G),
        'h' => Some(File::H),
        _ => None,
    }
}

pub fn rank_from_char(c: char) -> Option<Rank> {
    match c {
        '1' => Some(Rank::First),
        '2' => Some(Rank::Second),
        '3' => Some(Rank::Third),
        '4' => Some(Rank::Fourth),
        '5' => Some(Rank::Fifth),
        '6' => Some(Rank::Sixth),
        '7' => Some(Rank::Seventh),
        '8' => Some(Rank::Eighth),
        _ => None,
    }
}

fn format_piece(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UciMoveError {
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}
