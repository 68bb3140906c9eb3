//! Move-by-move replay of a game record.

use chess::{MoveDescription, MoveError, PieceColor, Position};
use cozy_chess::Move;

use crate::error::{AnnotatorError, Result};

/// One ply of a replayed game.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    /// 1-based ply index.
    pub ply: usize,
    pub mv: Move,
    pub description: MoveDescription,
    pub before: Position,
    pub after: Position,
}

/// The side that played `entry`, read from the position it was played in.
pub fn mover_of(entry: &TimelineEntry) -> PieceColor {
    entry.before.side_to_move()
}

#[derive(Debug, Clone)]
pub struct Timeline {
    start: Position,
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Replay `moves` from `start`, stopping at the first illegal move.
    #[tracing::instrument(level = "debug", skip_all, fields(moves = moves.len()))]
    pub fn replay(start: Position, moves: &[Move]) -> Result<Self> {
        let mut entries = Vec::with_capacity(moves.len());
        let mut current = start.clone();

        for (idx, &mv) in moves.iter().enumerate() {
            let ply = idx + 1;
            let illegal = |source: MoveError| AnnotatorError::IllegalMove {
                ply,
                mv: chess::format_uci_move(mv),
                source,
            };

            let description = current.describe(mv).map_err(illegal)?;
            let after = current.play(mv).map_err(illegal)?;

            entries.push(TimelineEntry {
                ply,
                mv,
                description,
                before: current,
                after: after.clone(),
            });
            current = after;
        }

        tracing::debug!(plies = entries.len(), "Replay finished");
        Ok(Self { start, entries })
    }

    /// Replay moves written in SAN.
    pub fn replay_san<S: AsRef<str>>(start: Position, moves: &[S]) -> Result<Self> {
        Self::replay_text(start, moves, |pos, text| pos.parse_san(text).map_err(MoveError::from))
    }

    /// Replay moves written in UCI (either castling form).
    pub fn replay_uci<S: AsRef<str>>(start: Position, moves: &[S]) -> Result<Self> {
        Self::replay_text(start, moves, |pos, text| pos.parse_uci(text))
    }

    fn replay_text<S: AsRef<str>>(
        start: Position,
        moves: &[S],
        parse: impl Fn(&Position, &str) -> std::result::Result<Move, MoveError>,
    ) -> Result<Self> {
        let mut parsed = Vec::with_capacity(moves.len());
        let mut current = start.clone();

        for (idx, text) in moves.iter().enumerate() {
            let text = text.as_ref();
            let illegal = |source: MoveError| AnnotatorError::IllegalMove {
                ply: idx + 1,
                mv: text.to_string(),
                source,
            };
            let mv = parse(&current, text).map_err(illegal)?;
            current = current.play(mv).map_err(illegal)?;
            parsed.push(mv);
        }

        Self::replay(start, &parsed)
    }

    pub fn start(&self) -> &Position {
        &self.start
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimelineEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TimelineEntry> {
        self.entries.last()
    }

    pub fn final_position(&self) -> &Position {
        self.entries
            .last()
            .map(|entry| &entry.after)
            .unwrap_or(&self.start)
    }

    /// Moves in UCI notation (standard castling), in play order.
    pub fn uci_moves(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.description.uci.clone())
            .collect()
    }

    /// How often the position after `ply` (0 = start) has occurred up to and including it.
    pub fn repetition_count(&self, ply: usize) -> usize {
        let ply = ply.min(self.entries.len());
        let history: Vec<Position> = std::iter::once(&self.start)
            .chain(self.entries[..ply].iter().map(|entry| &entry.after))
            .cloned()
            .collect();
        let current = match ply {
            0 => &self.start,
            n => &self.entries[n - 1].after,
        };
        chess::repetition_count(&history, current)
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a TimelineEntry;
    type IntoIter = std::slice::Iter<'a, TimelineEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_chain_positions() {
        let timeline =
            Timeline::replay_san(Position::startpos(), &["e4", "e5", "Nf3", "Nc6"]).unwrap();

        assert_eq!(timeline.len(), 4);
        for pair in timeline.entries().windows(2) {
            assert_eq!(pair[0].after, pair[1].before, "after of ply {} must be before of the next", pair[0].ply);
        }
        assert_eq!(timeline.entries()[0].ply, 1);
        assert_eq!(mover_of(&timeline.entries()[1]), PieceColor::Black);
        assert_eq!(timeline.uci_moves(), vec!["e2e4", "e7e5", "g1f3", "b8c6"]);
    }

    #[test]
    fn mover_follows_the_start_position() {
        let start = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 b - - 0 1").unwrap();
        let timeline = Timeline::replay_san(start, &["Kd7", "e4"]).unwrap();
        let movers: Vec<_> = timeline.iter().map(mover_of).collect();
        assert_eq!(movers, vec![PieceColor::Black, PieceColor::White]);
    }

    #[test]
    fn illegal_move_reports_its_ply() {
        let err = Timeline::replay_san(Position::startpos(), &["e4", "e5", "Ke3"]).unwrap_err();
        match err {
            AnnotatorError::IllegalMove { ply, mv, .. } => {
                assert_eq!(ply, 3);
                assert_eq!(mv, "Ke3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn illegal_raw_move_is_rejected() {
        let mv: Move = "e2e5".parse().unwrap();
        let err = Timeline::replay(Position::startpos(), &[mv]).unwrap_err();
        assert!(matches!(err, AnnotatorError::IllegalMove { ply: 1, .. }));
    }

    #[test]
    fn uci_castling_is_accepted() {
        let start = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let timeline = Timeline::replay_uci(start, &["e1g1", "e8c8"]).unwrap();
        assert!(timeline.entries()[0].description.is_castling);
        assert_eq!(timeline.uci_moves(), vec!["e1g1", "e8c8"]);
    }

    #[test]
    fn repetition_counts_returns_to_start() {
        let timeline = Timeline::replay_san(
            Position::startpos(),
            &["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1", "Ng8"],
        )
        .unwrap();
        assert_eq!(timeline.repetition_count(0), 1);
        assert_eq!(timeline.repetition_count(4), 2);
        assert_eq!(timeline.repetition_count(8), 3);
        assert_eq!(timeline.repetition_count(3), 1);
    }

    #[test]
    fn empty_record_ends_at_start() {
        let timeline = Timeline::replay(Position::startpos(), &[]).unwrap();
        assert!(timeline.is_empty());
        assert_eq!(timeline.final_position(), &Position::startpos());
    }
}
