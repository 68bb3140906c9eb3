//! Engine evaluation scores.

use serde::{Deserialize, Serialize};

/// Engine evaluation score.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N moves,
/// negative N = side-to-move gets mated in N moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisScore {
    Centipawns(i32),
    Mate(i32),
}

impl AnalysisScore {
    pub fn display(&self) -> String {
        match self {
            Self::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) => {
                if *m > 0 {
                    format!("+M{}", m)
                } else {
                    format!("-M{}", m.abs())
                }
            }
        }
    }

    /// Convert to centipawns for comparison.
    ///
    /// Mate in N maps to `mate_score - N` for the winning side and
    /// `-mate_score - N` (N negative) for the losing side, so a faster mate
    /// is always worth more than a slower one.
    pub fn to_cp(&self, mate_score: i32) -> i32 {
        match *self {
            Self::Centipawns(cp) => cp,
            Self::Mate(m) if m > 0 => mate_score - m,
            Self::Mate(m) => -mate_score - m,
        }
    }

    /// Negate the score (flip perspective).
    pub fn negate(&self) -> Self {
        match *self {
            Self::Centipawns(cp) => Self::Centipawns(-cp),
            Self::Mate(m) => Self::Mate(-m),
        }
    }

    pub fn is_mate(&self) -> bool {
        matches!(self, Self::Mate(_))
    }

    /// Mate distance when the side to move delivers mate.
    pub fn mating_in(&self) -> Option<i32> {
        match *self {
            Self::Mate(m) if m > 0 => Some(m),
            _ => None,
        }
    }

    /// Mate distance when the side to move is being mated.
    pub fn mated_in(&self) -> Option<i32> {
        match *self {
            Self::Mate(m) if m <= 0 => Some(m.abs()),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
