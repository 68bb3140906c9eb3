//! How a game ended and whether a resignation was justified.

use chess::{AnalysisScore, PieceColor};
use engine::Evaluator;
use serde::Serialize;

use crate::config::AnnotatorConfig;
use crate::timeline::Timeline;

/// The declared result of a game record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    WhiteWins,
    BlackWins,
    Draw,
    /// Anything else, kept verbatim (`*`, empty, ...).
    Unfinished(String),
}

impl GameOutcome {
    pub fn parse(result: &str) -> Self {
        match result.trim() {
            "1-0" => Self::WhiteWins,
            "0-1" => Self::BlackWins,
            "1/2-1/2" => Self::Draw,
            other => Self::Unfinished(other.to_string()),
        }
    }

    pub fn winner(&self) -> Option<PieceColor> {
        match self {
            Self::WhiteWins => Some(PieceColor::White),
            Self::BlackWins => Some(PieceColor::Black),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::WhiteWins => "1-0",
            Self::BlackWins => "0-1",
            Self::Draw => "1/2-1/2",
            Self::Unfinished(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DrawType {
    Stalemate,
    #[serde(rename = "Threefold Repetition")]
    ThreefoldRepetition,
    #[serde(rename = "Insufficient Material")]
    InsufficientMaterial,
    Agreement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WinningMethod {
    Checkmate,
    Resignation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResignationVerdict {
    Correct,
    Incorrect,
    Inconsistent,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResignationAnalysis {
    pub verdict: ResignationVerdict,
    pub reason: String,
    /// Winner's score before the last move.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_cp: Option<i32>,
}

impl ResignationAnalysis {
    fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            verdict: ResignationVerdict::Unavailable,
            reason: reason.into(),
            score_cp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Termination {
    pub result: String,
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PieceColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw_type: Option<DrawType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_method: Option<WinningMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resignation: Option<ResignationAnalysis>,
}

/// Classify the end of `timeline` given its declared `outcome`.
pub fn adjudicate(
    timeline: &Timeline,
    outcome: &GameOutcome,
    config: &AnnotatorConfig,
    engine: Option<&mut dyn Evaluator>,
) -> Termination {
    let mut termination = Termination {
        result: outcome.as_str().to_string(),
        finished: !matches!(outcome, GameOutcome::Unfinished(_)),
        winner: outcome.winner(),
        draw_type: None,
        winning_method: None,
        resignation: None,
    };

    match outcome {
        GameOutcome::Draw => termination.draw_type = Some(draw_type(timeline)),
        GameOutcome::WhiteWins | GameOutcome::BlackWins => {
            let Some(winner) = outcome.winner() else {
                return termination;
            };
            if timeline.final_position().is_checkmate() {
                termination.winning_method = Some(WinningMethod::Checkmate);
            } else {
                termination.winning_method = Some(WinningMethod::Resignation);
                termination.resignation = Some(judge_resignation(timeline, winner, config, engine));
            }
        }
        GameOutcome::Unfinished(_) => {}
    }
    termination
}

/// Automatic draw conditions first, in fixed priority; agreement otherwise.
pub fn draw_type(timeline: &Timeline) -> DrawType {
    let last = timeline.final_position();
    if last.is_stalemate() {
        DrawType::Stalemate
    } else if timeline.repetition_count(timeline.len()) >= 3 {
        DrawType::ThreefoldRepetition
    } else if last.is_insufficient_material() {
        DrawType::InsufficientMaterial
    } else {
        DrawType::Agreement
    }
}

/// Judge a resignation from the position before the last move, from the
/// winner's point of view.
fn judge_resignation(
    timeline: &Timeline,
    winner: PieceColor,
    config: &AnnotatorConfig,
    engine: Option<&mut dyn Evaluator>,
) -> ResignationAnalysis {
    let Some(engine) = engine else {
        return ResignationAnalysis::unavailable("no evaluator configured");
    };
    let Some(last) = timeline.last() else {
        return ResignationAnalysis::unavailable("no moves were played");
    };

    let score = match engine.evaluate(&last.before, config.resignation_budget.budget()) {
        Ok(evaluation) => evaluation.score_for(winner),
        Err(e) => {
            tracing::warn!(error = %e, "Resignation check degraded");
            return ResignationAnalysis::unavailable(e.to_string());
        }
    };

    let band = config.resignation_draw_band_cp;
    let (verdict, reason) = match score {
        AnalysisScore::Mate(m) if m > 0 => (ResignationVerdict::Correct, "opponent has a forced mate"),
        AnalysisScore::Mate(_) => (ResignationVerdict::Incorrect, "resigning side had a forced mate"),
        AnalysisScore::Centipawns(cp) if cp >= band => (ResignationVerdict::Correct, "position was losing"),
        AnalysisScore::Centipawns(cp) if cp <= -band => {
            (ResignationVerdict::Incorrect, "resigning side was better")
        }
        AnalysisScore::Centipawns(_) => (ResignationVerdict::Inconsistent, "position was close to a draw"),
    };

    ResignationAnalysis {
        verdict,
        reason: reason.to_string(),
        score_cp: Some(score.to_cp(config.mate_score_cp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Position;
    use engine::mock::ScriptedEvaluator;

    fn timeline(fen: &str, moves: &[&str]) -> Timeline {
        Timeline::replay_san(Position::from_fen(fen).unwrap(), moves).unwrap()
    }

    fn resign_after_e4(score: AnalysisScore) -> ResignationAnalysis {
        let timeline = timeline(chess::STARTING_FEN, &["e4"]);
        // Scores are from white's side: the start position is before the last move.
        let mut engine = ScriptedEvaluator::new().with_score(chess::STARTING_FEN, score);
        adjudicate(
            &timeline,
            &GameOutcome::WhiteWins,
            &AnnotatorConfig::default(),
            Some(&mut engine),
        )
        .resignation
        .unwrap()
    }

    #[test]
    fn parses_results() {
        assert_eq!(GameOutcome::parse("1-0"), GameOutcome::WhiteWins);
        assert_eq!(GameOutcome::parse(" 0-1 "), GameOutcome::BlackWins);
        assert_eq!(GameOutcome::parse("1/2-1/2"), GameOutcome::Draw);
        assert_eq!(GameOutcome::parse("*"), GameOutcome::Unfinished("*".to_string()));
    }

    #[test]
    fn checkmate_is_detected() {
        let timeline = timeline(chess::STARTING_FEN, &["f3", "e5", "g4", "Qh4#"]);
        let termination = adjudicate(&timeline, &GameOutcome::BlackWins, &AnnotatorConfig::default(), None);
        assert_eq!(termination.winning_method, Some(WinningMethod::Checkmate));
        assert_eq!(termination.resignation, None);
        assert_eq!(termination.winner, Some(PieceColor::Black));
    }

    #[test]
    fn insufficient_material_beats_agreement() {
        // Bishop takes the last pawn: K+B vs K.
        let timeline = timeline("4k3/8/8/8/8/8/1p6/B3K3 w - - 0 1", &["Bxb2"]);
        let termination = adjudicate(&timeline, &GameOutcome::Draw, &AnnotatorConfig::default(), None);
        assert_eq!(termination.draw_type, Some(DrawType::InsufficientMaterial));
    }

    #[test]
    fn stalemate_has_priority() {
        // K+Q vs K, and after Qb6 black has no move but is not in check.
        let timeline = timeline("k7/8/8/8/8/8/8/1Q4K1 w - - 0 1", &["Qb6"]);
        assert_eq!(draw_type(&timeline), DrawType::Stalemate);
    }

    #[test]
    fn threefold_repetition_is_detected() {
        let timeline = timeline(
            chess::STARTING_FEN,
            &["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1", "Ng8"],
        );
        assert_eq!(draw_type(&timeline), DrawType::ThreefoldRepetition);
    }

    #[test]
    fn plain_draw_is_agreement() {
        let timeline = timeline(chess::STARTING_FEN, &["e4", "e5"]);
        assert_eq!(draw_type(&timeline), DrawType::Agreement);
    }

    #[test]
    fn resignation_verdicts_follow_the_score() {
        let cases = [
            (AnalysisScore::Mate(3), ResignationVerdict::Correct),
            (AnalysisScore::Mate(-2), ResignationVerdict::Incorrect),
            (AnalysisScore::Centipawns(400), ResignationVerdict::Correct),
            (AnalysisScore::Centipawns(-120), ResignationVerdict::Incorrect),
            (AnalysisScore::Centipawns(20), ResignationVerdict::Inconsistent),
            (AnalysisScore::Centipawns(-50), ResignationVerdict::Incorrect),
        ];
        for (score, expected) in cases {
            assert_eq!(resign_after_e4(score).verdict, expected, "score {score:?}");
        }
    }

    #[test]
    fn resignation_reason_is_reported() {
        let analysis = resign_after_e4(AnalysisScore::Mate(-1));
        assert_eq!(analysis.reason, "resigning side had a forced mate");
        assert_eq!(analysis.score_cp, Some(-9_999));
    }

    #[test]
    fn missing_engine_leaves_resignation_unavailable() {
        let timeline = timeline(chess::STARTING_FEN, &["e4"]);
        let termination = adjudicate(&timeline, &GameOutcome::WhiteWins, &AnnotatorConfig::default(), None);
        assert_eq!(termination.winning_method, Some(WinningMethod::Resignation));
        assert_eq!(termination.resignation.unwrap().verdict, ResignationVerdict::Unavailable);
    }

    #[test]
    fn unfinished_games_are_left_alone() {
        let timeline = timeline(chess::STARTING_FEN, &["e4"]);
        let termination = adjudicate(
            &timeline,
            &GameOutcome::parse("*"),
            &AnnotatorConfig::default(),
            None,
        );
        assert!(!termination.finished);
        assert_eq!(termination.draw_type, None);
        assert_eq!(termination.winning_method, None);
    }
}
