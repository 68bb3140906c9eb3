pub mod analysis;
pub mod fen;
pub mod position;
pub mod san;
pub mod types;
pub mod uci;

pub use analysis::AnalysisScore;
pub use fen::{FenError, STARTING_FEN};
pub use position::{is_repetition, repetition_count, MoveDescription, MoveError, Position};
pub use san::SanError;
pub use types::{PieceColor, PieceKind};
pub use uci::{convert_uci_castling_to_cozy, format_square, format_uci_move, UciMoveError};

pub use cozy_chess::{BitBoard, File, Move, Rank, Square};
