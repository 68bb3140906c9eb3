use cozy_chess::Board;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let fen = fen.trim();
    if fen.split_whitespace().count() == 0 {
        return Err(FenError::InvalidFormat);
    }

    fen.parse()
        .map_err(|_| FenError::InvalidBoardLayout(fen.to_string()))
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    // Use cozy-chess's Display implementation
    board.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Invalid board layout: {0}")]
    InvalidBoardLayout(String),
}
