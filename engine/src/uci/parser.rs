use chess::uci::parse_uci_move;
use chess::AnalysisScore;
use cozy_chess::Move;

use crate::EngineInfo;

/// Incoming message from UCI engine
#[derive(Debug, Clone)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    /// `mv` is `None` for `bestmove (none)`, sent when the position has no legal moves.
    BestMove { mv: Option<Move>, ponder: Option<Move> },
    Info(EngineInfo),
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, crate::UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"bestmove") => {
            let Some(&best) = tokens.get(1) else {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            };
            let mv = match best {
                "(none)" | "0000" => None,
                other => Some(parse_uci_move(other)?),
            };
            let ponder = if tokens.len() >= 4 && tokens[2] == "ponder" {
                Some(parse_uci_move(tokens[3])?)
            } else {
                None
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }

        Some(&"info") => Ok(UciMessage::Info(parse_info_line(&tokens[1..]))),

        _ => Err(crate::UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse an "info" line from the engine. Other fields are skipped.
fn parse_info_line(tokens: &[&str]) -> EngineInfo {
    let mut info = EngineInfo::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                info.depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "multipv" => {
                i += 1;
                info.multipv = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&score_type) = tokens.get(i) {
                    i += 1;
                    if let Some(value_str) = tokens.get(i) {
                        info.score = match score_type {
                            "cp" => value_str.parse().ok().map(AnalysisScore::Centipawns),
                            "mate" => value_str.parse().ok().map(AnalysisScore::Mate),
                            _ => None,
                        };
                    }
                }
            }
            // The variation and free text run to end of line
            "pv" | "string" => break,
            _ => {}
        }
        i += 1;
    }

    info
}
