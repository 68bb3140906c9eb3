//! Immutable position handle over a cozy-chess `Board`.
//!
//! Every mutating operation returns a new `Position`; the receiver is never
//! touched, so lookahead is just "play on a copy and drop it".

use cozy_chess::{BitBoard, Board, File, Move, Piece, Square};

use crate::fen::{parse_fen, FenError};
use crate::san::{self, SanError};
use crate::types::{PieceColor, PieceKind};
use crate::uci::{convert_uci_castling_to_cozy, format_square, format_uci_move, parse_uci_move, UciMoveError};

#[derive(Debug, Clone)]
pub struct Position {
    board: Board,
}

/// Everything a detector needs to know about a move, resolved by the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDescription {
    pub mv: Move,
    pub piece: PieceKind,
    pub color: PieceColor,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub is_capture: bool,
    pub is_castling: bool,
    pub is_en_passant: bool,
    pub san: String,
    pub uci: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("Illegal move {mv} in position {fen}")]
    Illegal { mv: String, fen: String },
    #[error("SAN error: {0}")]
    San(#[from] SanError),
    #[error("UCI error: {0}")]
    Uci(#[from] UciMoveError),
}

impl Position {
    pub fn startpos() -> Self {
        Self {
            board: Board::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        Ok(Self {
            board: parse_fen(fen)?,
        })
    }

    pub fn from_board(board: Board) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn fen(&self) -> String {
        crate::fen::format_fen(&self.board)
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.board.side_to_move().into()
    }

    pub fn fullmove_number(&self) -> u16 {
        self.board.fullmove_number()
    }

    /// Zobrist hash of the position (placement, side, castling, en passant).
    pub fn hash(&self) -> u64 {
        self.board.hash()
    }

    /// Same placement, side to move, castling and en-passant rights.
    pub fn same_position(&self, other: &Position) -> bool {
        self.board.same_position(&other.board)
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.board.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    pub fn has_legal_moves(&self) -> bool {
        self.board.generate_moves(|_| true)
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        self.board.is_legal(mv)
    }

    /// Play `mv` on a copy of this position.
    pub fn play(&self, mv: Move) -> Result<Position, MoveError> {
        if !self.board.is_legal(mv) {
            return Err(MoveError::Illegal {
                mv: format_uci_move(mv),
                fen: self.fen(),
            });
        }
        let mut board = self.board.clone();
        board.play_unchecked(mv);
        Ok(Self { board })
    }

    /// Every legal move paired with the position it leads to.
    pub fn successors(&self) -> Vec<(Move, Position)> {
        self.legal_moves()
            .into_iter()
            .map(|mv| {
                let mut board = self.board.clone();
                board.play_unchecked(mv);
                (mv, Self { board })
            })
            .collect()
    }

    /// The position with the side to move passed; `None` while in check.
    pub fn null_move(&self) -> Option<Position> {
        self.board.null_move().map(|board| Self { board })
    }

    pub fn piece_at(&self, sq: Square) -> Option<(PieceKind, PieceColor)> {
        let piece = self.board.piece_on(sq)?;
        let color = self.board.color_on(sq)?;
        Some((piece.into(), color.into()))
    }

    pub fn pieces(&self, kind: PieceKind, color: PieceColor) -> BitBoard {
        self.board.colored_pieces(color.into(), kind.into())
    }

    pub fn colors(&self, color: PieceColor) -> BitBoard {
        self.board.colors(color.into())
    }

    pub fn occupied(&self) -> BitBoard {
        self.board.occupied()
    }

    pub fn king(&self, color: PieceColor) -> Square {
        self.board.king(color.into())
    }

    /// Pieces of `color` that directly attack `sq` given the current occupancy.
    pub fn attackers(&self, sq: Square, color: PieceColor) -> BitBoard {
        attackers_of(&self.board, sq, color)
    }

    pub fn is_attacked(&self, sq: Square, color: PieceColor) -> bool {
        !self.attackers(sq, color).is_empty()
    }

    /// Pieces giving check to the side to move.
    pub fn checkers(&self) -> BitBoard {
        self.board.checkers()
    }

    pub fn is_check(&self) -> bool {
        !self.board.checkers().is_empty()
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_check() && !self.has_legal_moves()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_check() && !self.has_legal_moves()
    }

    /// Neither side has mating material.
    pub fn is_insufficient_material(&self) -> bool {
        PieceColor::ALL
            .into_iter()
            .all(|color| self.has_insufficient_material(color))
    }

    /// Whether `color` can no longer deliver mate by any sequence of legal moves.
    pub fn has_insufficient_material(&self, color: PieceColor) -> bool {
        let board = &self.board;
        let ours = board.colors(color.into());
        let theirs = board.colors((!color).into());

        let heavy = board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
        if !(ours & heavy).is_empty() {
            return false;
        }

        if !(ours & board.pieces(Piece::Knight)).is_empty() {
            let their_minor_or_pawn =
                theirs & !board.pieces(Piece::King) & !board.pieces(Piece::Queen);
            return ours.len() <= 2 && their_minor_or_pawn.is_empty();
        }

        let bishops = board.pieces(Piece::Bishop);
        if !(ours & bishops).is_empty() {
            let all_dark = bishops.into_iter().all(is_dark_square);
            let all_light = bishops.into_iter().all(|sq| !is_dark_square(sq));
            let blockers = board.pieces(Piece::Pawn) | board.pieces(Piece::Knight);
            return (all_dark || all_light) && blockers.is_empty();
        }

        true
    }

    pub fn gives_check(&self, mv: Move) -> bool {
        self.play(mv).map(|after| after.is_check()).unwrap_or(false)
    }

    pub fn gives_mate(&self, mv: Move) -> bool {
        self.play(mv).map(|after| after.is_checkmate()).unwrap_or(false)
    }

    pub fn is_capture(&self, mv: Move) -> bool {
        san::is_capture(&self.board, mv)
    }

    pub fn is_castling(&self, mv: Move) -> bool {
        san::is_castle(&self.board, mv)
    }

    pub fn is_en_passant(&self, mv: Move) -> bool {
        san::is_en_passant(&self.board, mv)
    }

    /// Kind of the piece removed by `mv`, including the en-passant pawn.
    pub fn captured_piece(&self, mv: Move) -> Option<PieceKind> {
        if self.is_en_passant(mv) {
            Some(PieceKind::Pawn)
        } else if self.is_capture(mv) {
            self.board.piece_on(mv.to).map(Into::into)
        } else {
            None
        }
    }

    /// Square of the pawn removed by an en-passant capture.
    pub fn en_passant_victim(&self, mv: Move) -> Option<Square> {
        self.is_en_passant(mv)
            .then(|| Square::new(mv.to.file(), mv.from.rank()))
    }

    /// Where the moving piece ends up; the king's destination when castling.
    pub fn landing_square(&self, mv: Move) -> Square {
        if self.is_castling(mv) {
            let file = if mv.to.file() > mv.from.file() {
                File::G
            } else {
                File::C
            };
            Square::new(file, mv.from.rank())
        } else {
            mv.to
        }
    }

    pub fn describe(&self, mv: Move) -> Result<MoveDescription, MoveError> {
        let (piece, color) = self
            .piece_at(mv.from)
            .filter(|_| self.board.is_legal(mv))
            .ok_or_else(|| MoveError::Illegal {
                mv: format_uci_move(mv),
                fen: self.fen(),
            })?;

        Ok(MoveDescription {
            mv,
            piece,
            color,
            captured: self.captured_piece(mv),
            promotion: mv.promotion.map(Into::into),
            is_capture: self.is_capture(mv),
            is_castling: self.is_castling(mv),
            is_en_passant: self.is_en_passant(mv),
            san: self.san(mv),
            uci: self.uci(mv),
        })
    }

    pub fn san(&self, mv: Move) -> String {
        san::format_san(&self.board, mv)
    }

    pub fn parse_san(&self, text: &str) -> Result<Move, SanError> {
        san::parse_san(&self.board, text)
    }

    /// UCI text for `mv`, castling written as the king's two-square step.
    pub fn uci(&self, mv: Move) -> String {
        if self.is_castling(mv) {
            let to = self.landing_square(mv);
            format!("{}{}", format_square(mv.from), format_square(to))
        } else {
            format_uci_move(mv)
        }
    }

    /// Parse UCI text (either castling form) into a legal move.
    pub fn parse_uci(&self, text: &str) -> Result<Move, MoveError> {
        let raw = parse_uci_move(text)?;
        let mv = convert_uci_castling_to_cozy(raw, &self.legal_moves());
        if !self.board.is_legal(mv) {
            return Err(MoveError::Illegal {
                mv: text.trim().to_string(),
                fen: self.fen(),
            });
        }
        Ok(mv)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.same_position(other)
            && self.board.halfmove_clock() == other.board.halfmove_clock()
            && self.board.fullmove_number() == other.board.fullmove_number()
    }
}

impl Eq for Position {}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.board)
    }
}

/// How many positions in `history` are the same position as `current`.
pub fn repetition_count(history: &[Position], current: &Position) -> usize {
    let hash = current.hash();
    history
        .iter()
        .filter(|p| p.hash() == hash && p.same_position(current))
        .count()
}

/// `current` has occurred at least `times` times in `history`.
pub fn is_repetition(history: &[Position], current: &Position, times: usize) -> bool {
    repetition_count(history, current) >= times
}

fn is_dark_square(sq: Square) -> bool {
    (sq.file() as usize + sq.rank() as usize) % 2 == 0
}

fn attackers_of(board: &Board, sq: Square, color: PieceColor) -> BitBoard {
    let color: cozy_chess::Color = color.into();
    let occupied = board.occupied();
    let ours = board.colors(color);

    let diagonal = board.pieces(Piece::Bishop) | board.pieces(Piece::Queen);
    let orthogonal = board.pieces(Piece::Rook) | board.pieces(Piece::Queen);

    let mut attackers = cozy_chess::get_pawn_attacks(sq, !color) & board.pieces(Piece::Pawn);
    attackers |= cozy_chess::get_knight_moves(sq) & board.pieces(Piece::Knight);
    attackers |= cozy_chess::get_bishop_moves(sq, occupied) & diagonal;
    attackers |= cozy_chess::get_rook_moves(sq, occupied) & orthogonal;
    attackers |= cozy_chess::get_king_moves(sq) & board.pieces(Piece::King);

    attackers & ours
}
