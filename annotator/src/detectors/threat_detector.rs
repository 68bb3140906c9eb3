use chess::{PieceColor, PieceKind};
use engine::{Evaluator, SearchBudget};
use serde::Serialize;
use serde_json::{json, Value};

use super::detector::{sample_cp, to_report, BySide, EngineStatus, PlyContext, PlyDetector, Tally};
use crate::board::{material_value, square_name, AttackMap};
use crate::config::AnnotatorConfig;

const NAME: &str = "material_threats";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatenedPiece {
    pub square: String,
    pub piece: PieceKind,
    pub attackers: usize,
    pub defenders: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialThreat {
    pub ply: usize,
    pub color: PieceColor,
    pub san: String,
    pub threatened: Vec<ThreatenedPiece>,
    /// Mover's score after the move, when an evaluator answered.
    pub evaluation_cp: Option<i32>,
}

#[derive(Debug, Serialize)]
struct ThreatReport<'a> {
    #[serde(flatten)]
    threats: &'a BySide<Tally<MaterialThreat>>,
    evaluation: Value,
}

/// Scans the whole board after each move for enemy pieces the mover could
/// plausibly win.
#[derive(Debug)]
pub struct ThreatDetector {
    mate_score_cp: i32,
    budget: SearchBudget,
    threats: BySide<Tally<MaterialThreat>>,
    status: EngineStatus,
}

impl ThreatDetector {
    pub fn new(config: &AnnotatorConfig) -> Self {
        Self {
            mate_score_cp: config.mate_score_cp,
            budget: config.zwischenzug_budget.budget(),
            threats: BySide::default(),
            status: EngineStatus::default(),
        }
    }

    pub fn threats(&self) -> &BySide<Tally<MaterialThreat>> {
        &self.threats
    }
}

impl PlyDetector for ThreatDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn needs_engine(&self) -> bool {
        true
    }

    fn observe(&mut self, ctx: &PlyContext, engine: Option<&mut dyn Evaluator>) {
        let engine = self.status.usable(NAME, engine);

        let mover = ctx.mover();
        let threatened = threatened_pieces(ctx, mover);
        if threatened.is_empty() {
            return;
        }

        let evaluation_cp = engine.and_then(|engine| {
            match sample_cp(engine, ctx.after(), self.budget, mover, self.mate_score_cp) {
                Ok(cp) => Some(cp),
                Err(e) => {
                    self.status.record(NAME, &e);
                    None
                }
            }
        });

        tracing::debug!(ply = ctx.entry.ply, pieces = threatened.len(), "Material threat");
        self.threats.get_mut(mover).push(MaterialThreat {
            ply: ctx.entry.ply,
            color: mover,
            san: ctx.entry.description.san.clone(),
            threatened,
            evaluation_cp,
        });
    }

    fn report(&self) -> Value {
        let evaluation = self
            .status
            .unavailable()
            .unwrap_or_else(|| json!({ "status": "available" }));
        to_report(&ThreatReport {
            threats: &self.threats,
            evaluation,
        })
    }
}

/// Enemy pieces attacked with no defender, or attacked more often than
/// defended by an attacker worth no more than the piece.
pub fn threatened_pieces(ctx: &PlyContext, mover: PieceColor) -> Vec<ThreatenedPiece> {
    let after = ctx.after();
    let enemy = !mover;
    let attacks: &AttackMap = ctx.after_attacks;

    let targets = after.colors(enemy) & !after.pieces(PieceKind::King, enemy);
    targets
        .into_iter()
        .filter_map(|square| {
            let (piece, _) = after.piece_at(square)?;
            let attackers = attacks.attackers_of(square, mover).len();
            let defenders = attacks.attackers_of(square, enemy).len();
            if attackers == 0 {
                return None;
            }
            let cheap_enough = attacks
                .cheapest_attacker(square, mover)
                .is_some_and(|cheapest| cheapest <= material_value(piece));
            let threatened = defenders == 0 || (attackers > defenders && cheap_enough);
            threatened.then(|| ThreatenedPiece {
                square: square_name(square),
                piece,
                attackers,
                defenders,
            })
        })
        .collect()
}
