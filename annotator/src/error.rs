use std::path::PathBuf;

use chess::MoveError;

#[derive(Debug, thiserror::Error)]
pub enum AnnotatorError {
    #[error("Illegal move {mv} at ply {ply}")]
    IllegalMove {
        ply: usize,
        mv: String,
        #[source]
        source: MoveError,
    },
    #[error("Invalid start position: {0}")]
    InvalidStart(#[from] chess::FenError),
    #[error("Failed to read opening catalog {path}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, AnnotatorError>;
