//! Standard Algebraic Notation.

use cozy_chess::{Board, Color, GameStatus, Move, Piece, Square};

use crate::types::PieceKind;
use crate::uci::{file_from_char, file_to_char, rank_from_char, rank_to_char};

/// Parse Standard Algebraic Notation (SAN) move against `board`.
///
/// Accepts check/mate markers and annotation glyphs (`+`, `#`, `!`, `?`),
/// `0-0` as well as `O-O`, and promotions with or without `=`.
pub fn parse_san(board: &Board, san: &str) -> Result<Move, SanError> {
    let trimmed = san.trim().trim_end_matches(['+', '#', '!', '?']);
    if trimmed.is_empty() {
        return Err(SanError::InvalidFormat(san.to_string()));
    }

    let legal = legal_moves(board);

    match trimmed {
        "O-O" | "0-0" => return find_castle(board, &legal, true, san),
        "O-O-O" | "0-0-0" => return find_castle(board, &legal, false, san),
        _ => {}
    }

    let pattern = SanPattern::parse(trimmed).ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;

    let mut candidates = legal.iter().copied().filter(|mv| {
        !is_castle(board, *mv) && pattern.matches(board, *mv)
    });

    let first = candidates
        .next()
        .ok_or_else(|| SanError::NoLegalMove(san.to_string()))?;
    if candidates.next().is_some() {
        return Err(SanError::AmbiguousMove(san.to_string()));
    }
    Ok(first)
}

/// Format a legal move as SAN, including the `+`/`#` suffix.
pub fn format_san(board: &Board, mv: Move) -> String {
    let mut san = String::new();

    if is_castle(board, mv) {
        if mv.to.file() > mv.from.file() {
            san.push_str("O-O");
        } else {
            san.push_str("O-O-O");
        }
    } else {
        let piece = board.piece_on(mv.from).unwrap_or(Piece::Pawn);
        let capture = is_capture(board, mv);

        if piece == Piece::Pawn {
            if capture {
                san.push(file_to_char(mv.from.file()));
            }
        } else {
            san.push(PieceKind::from(piece).to_char_upper());
            san.push_str(&disambiguation(board, mv, piece));
        }

        if capture {
            san.push('x');
        }
        san.push(file_to_char(mv.to.file()));
        san.push(rank_to_char(mv.to.rank()));

        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(PieceKind::from(promo).to_char_upper());
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if after.status() == GameStatus::Won {
        san.push('#');
    } else if !after.checkers().is_empty() {
        san.push('+');
    }

    san
}

/// The parsed shape of a non-castling SAN token.
#[derive(Debug)]
struct SanPattern {
    piece: Piece,
    from_file: Option<cozy_chess::File>,
    from_rank: Option<cozy_chess::Rank>,
    to: Square,
    promotion: Option<Piece>,
}

impl SanPattern {
    fn parse(token: &str) -> Option<Self> {
        let mut chars: Vec<char> = token.chars().filter(|c| *c != 'x' && *c != '=').collect();

        let piece = match chars.first() {
            Some(c) if c.is_ascii_uppercase() => {
                let kind = PieceKind::from_char(*c)?;
                chars.remove(0);
                Piece::from(kind)
            }
            _ => Piece::Pawn,
        };

        let promotion = match chars.last() {
            Some(c) if c.is_ascii_uppercase() => {
                let kind = PieceKind::from_char(*c)?;
                chars.pop();
                Some(Piece::from(kind))
            }
            _ => None,
        };

        if chars.len() < 2 {
            return None;
        }
        let rank_char = chars.pop()?;
        let file_char = chars.pop()?;
        let to = Square::new(file_from_char(file_char)?, rank_from_char(rank_char)?);

        let mut from_file = None;
        let mut from_rank = None;
        for c in chars {
            if let Some(file) = file_from_char(c) {
                from_file = Some(file);
            } else if let Some(rank) = rank_from_char(c) {
                from_rank = Some(rank);
            } else {
                return None;
            }
        }

        Some(Self {
            piece,
            from_file,
            from_rank,
            to,
            promotion,
        })
    }

    fn matches(&self, board: &Board, mv: Move) -> bool {
        board.piece_on(mv.from) == Some(self.piece)
            && mv.to == self.to
            && mv.promotion == self.promotion
            && self.from_file.is_none_or(|f| mv.from.file() == f)
            && self.from_rank.is_none_or(|r| mv.from.rank() == r)
    }
}

fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

fn find_castle(board: &Board, legal: &[Move], short: bool, san: &str) -> Result<Move, SanError> {
    legal
        .iter()
        .copied()
        .find(|mv| is_castle(board, *mv) && (mv.to.file() > mv.from.file()) == short)
        .ok_or_else(|| SanError::NoLegalMove(san.to_string()))
}

/// cozy-chess encodes castling as the king capturing its own rook.
pub(crate) fn is_castle(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.to) == Some(board.side_to_move())
}

pub(crate) fn is_en_passant(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::Pawn)
        && mv.from.file() != mv.to.file()
        && board.piece_on(mv.to).is_none()
}

pub(crate) fn is_capture(board: &Board, mv: Move) -> bool {
    let enemy: Color = !board.side_to_move();
    board.color_on(mv.to) == Some(enemy) || is_en_passant(board, mv)
}

fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut rivals = Vec::new();
    board.generate_moves(|mvs| {
        if mvs.piece == piece && mvs.from != mv.from && mvs.to.has(mv.to) {
            rivals.push(mvs.from);
        }
        false
    });

    if rivals.is_empty() {
        return String::new();
    }

    let file_unique = rivals.iter().all(|sq| sq.file() != mv.from.file());
    let rank_unique = rivals.iter().all(|sq| sq.rank() != mv.from.rank());

    if file_unique {
        file_to_char(mv.from.file()).to_string()
    } else if rank_unique {
        rank_to_char(mv.from.rank()).to_string()
    } else {
        format!(
            "{}{}",
            file_to_char(mv.from.file()),
            rank_to_char(mv.from.rank())
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
