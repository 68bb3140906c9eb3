use std::str::FromStr;

use chess::{PieceColor, PieceKind, Position, Square};
use engine::Evaluator;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::detector::{to_report, BySide, PlyContext, PlyDetector, Tally};
use crate::board::{material_value, piece_attacks, pinned_to_king, square_name, AttackMap};

/// How strictly a multi-target attack has to hold up before it counts as a fork.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForkPolicy {
    /// Undefended targets (or the king) only.
    Basic,
    /// As `Basic`, ignoring targets pinned to their own king.
    PinAware,
    /// As `PinAware`; the forking piece must also not be capturable by a piece
    /// worth the same or less.
    #[default]
    PinAndExchangeAware,
}

impl ForkPolicy {
    fn excludes_pinned(self) -> bool {
        !matches!(self, Self::Basic)
    }

    fn checks_exchanges(self) -> bool {
        matches!(self, Self::PinAndExchangeAware)
    }
}

impl FromStr for ForkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "pin-aware" => Ok(Self::PinAware),
            "pin-and-exchange-aware" => Ok(Self::PinAndExchangeAware),
            other => Err(format!("unknown fork policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkTarget {
    pub square: String,
    pub piece: PieceKind,
    pub value: u8,
    /// Defended by the opponent. Defended targets are dropped before a fork is
    /// built, so this is false on every reported target.
    pub protected: bool,
    /// The target is the king.
    pub forcing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterFork {
    /// The opponent's reply, in UCI.
    pub reply: String,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkCandidate {
    pub ply: usize,
    pub color: PieceColor,
    pub san: String,
    pub attacker_square: String,
    pub attacker: PieceKind,
    pub targets: Vec<ForkTarget>,
    pub counter_fork_exposed: bool,
    pub counter_fork: Option<CounterFork>,
}

/// Looks at the piece that just moved and reports it when it threatens two
/// or more qualifying enemy pieces.
#[derive(Debug, Default)]
pub struct ForkDetector {
    policy: ForkPolicy,
    forks: BySide<Tally<ForkCandidate>>,
}

impl ForkDetector {
    pub fn new(policy: ForkPolicy) -> Self {
        Self {
            policy,
            forks: BySide::default(),
        }
    }

    pub fn forks(&self) -> &BySide<Tally<ForkCandidate>> {
        &self.forks
    }

    /// The fork made by this ply, if any.
    pub fn detect(&self, ctx: &PlyContext) -> Option<ForkCandidate> {
        let mover = ctx.mover();
        let enemy = !mover;
        let after = ctx.after();
        let attacks = ctx.after_attacks;

        let square = ctx.before().landing_square(ctx.entry.mv);
        let (attacker, _) = after.piece_at(square)?;
        let attacker_value = material_value(attacker);

        if self.policy.checks_exchanges() && !is_safe(attacks, square, attacker_value, enemy) {
            return None;
        }

        let mut targets = Vec::new();
        for target_sq in piece_attacks(after, square, attacker, mover) & after.colors(enemy) {
            let Some((piece, _)) = after.piece_at(target_sq) else {
                continue;
            };
            let value = material_value(piece);
            let forcing = piece == PieceKind::King;
            let protected = !forcing && attacks.is_attacked(target_sq, enemy);

            if self.policy.excludes_pinned() && attacks.is_pinned(target_sq, enemy) {
                continue;
            }
            if protected {
                continue;
            }

            targets.push(ForkTarget {
                square: square_name(target_sq),
                piece,
                value,
                protected,
                forcing,
            });
        }

        if targets.len() < 2 {
            return None;
        }

        let counter_fork = find_counter_fork(after, mover, self.policy);
        Some(ForkCandidate {
            ply: ctx.entry.ply,
            color: mover,
            san: ctx.entry.description.san.clone(),
            attacker_square: square_name(square),
            attacker,
            targets,
            counter_fork_exposed: counter_fork.is_some(),
            counter_fork,
        })
    }
}

impl PlyDetector for ForkDetector {
    fn name(&self) -> &'static str {
        "forks"
    }

    fn observe(&mut self, ctx: &PlyContext, _engine: Option<&mut dyn Evaluator>) {
        if let Some(fork) = self.detect(ctx) {
            tracing::debug!(ply = fork.ply, san = %fork.san, targets = fork.targets.len(), "Fork");
            self.forks.get_mut(fork.color).push(fork);
        }
    }

    fn report(&self) -> Value {
        to_report(&self.forks)
    }
}

/// No enemy piece worth the same or less than the attacker can take it.
fn is_safe(attacks: &AttackMap, square: Square, attacker_value: u8, enemy: PieceColor) -> bool {
    attacks
        .cheapest_attacker(square, enemy)
        .map_or(true, |cheapest| cheapest > attacker_value)
}

/// The first opponent reply whose moved piece attacks two or more of the
/// mover's unprotected non-king pieces. Each reply is tried on its own copy.
fn find_counter_fork(after: &Position, mover: PieceColor, policy: ForkPolicy) -> Option<CounterFork> {
    let replier = !mover;
    for (reply, next) in after.successors() {
        let square = after.landing_square(reply);
        let Some((piece, _)) = next.piece_at(square) else {
            continue;
        };

        let pinned = if policy.excludes_pinned() {
            pinned_to_king(&next, mover)
        } else {
            chess::BitBoard::EMPTY
        };
        let exposed = piece_attacks(&next, square, piece, replier)
            & next.colors(mover)
            & !next.pieces(PieceKind::King, mover)
            & !pinned;

        let targets: Vec<String> = exposed
            .into_iter()
            .filter(|&target| !next.is_attacked(target, mover))
            .map(square_name)
            .collect();

        if targets.len() >= 2 {
            return Some(CounterFork {
                reply: after.uci(reply),
                targets,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Timeline;

    fn detect(policy: ForkPolicy, fen: &str, san: &str) -> Option<ForkCandidate> {
        let timeline = Timeline::replay_san(Position::from_fen(fen).unwrap(), &[san]).unwrap();
        let entry = &timeline.entries()[0];
        let after = AttackMap::compute(&entry.after);
        let ctx = PlyContext {
            entry,
            after_attacks: &after,
        };
        ForkDetector::new(policy).detect(&ctx)
    }

    #[test]
    fn knight_forks_undefended_rook_and_bishop() {
        // Nd5 hits the c7 rook and the f6 bishop; nothing defends either or attacks d5.
        let fork = detect(ForkPolicy::default(), "7k/2r5/5b2/8/8/4N3/8/4K3 w - - 0 1", "Nd5")
            .expect("knight fork");

        assert_eq!(fork.attacker, PieceKind::Knight);
        assert_eq!(fork.attacker_square, "d5");
        let squares: Vec<&str> = fork.targets.iter().map(|t| t.square.as_str()).collect();
        assert_eq!(squares, vec!["f6", "c7"]);
        assert!(fork.targets.iter().all(|t| !t.protected && !t.forcing));
        assert!(!fork.counter_fork_exposed);
    }

    #[test]
    fn equal_value_attacker_suppresses_fork() {
        // Black's b6 knight now attacks d5.
        let fen = "7k/2r5/1n3b2/8/8/4N3/8/4K3 w - - 0 1";
        assert!(detect(ForkPolicy::PinAndExchangeAware, fen, "Nd5").is_none());
        assert!(
            detect(ForkPolicy::PinAware, fen, "Nd5").is_some(),
            "attacker safety only applies to the strictest policy"
        );
    }

    #[test]
    fn protected_targets_do_not_count() {
        // The g7 pawn defends the f6 bishop.
        let fork = detect(ForkPolicy::Basic, "7k/2r3p1/5b2/8/8/4N3/8/4K3 w - - 0 1", "Nd5");
        assert!(fork.is_none());
    }

    #[test]
    fn defended_third_target_is_left_out() {
        // Nd5 also hits the b4 pawn, which the a5 pawn defends.
        let fork = detect(ForkPolicy::default(), "7k/2r5/5b2/p7/1p6/4N3/8/4K3 w - - 0 1", "Nd5")
            .expect("fork on the two loose pieces");

        let squares: Vec<&str> = fork.targets.iter().map(|t| t.square.as_str()).collect();
        assert_eq!(squares, vec!["f6", "c7"]);
        assert!(fork.targets.iter().all(|t| !t.protected));
    }

    #[test]
    fn king_is_a_forcing_target() {
        // Nf6+ hits the e8 king and the h7 rook.
        let fork = detect(ForkPolicy::default(), "4k3/7r/8/8/6N1/8/8/4K3 w - - 0 1", "Nf6+")
            .expect("royal fork");
        let king = fork.targets.iter().find(|t| t.piece == PieceKind::King).unwrap();
        assert!(king.forcing);
        assert!(!king.protected);
        assert_eq!(fork.targets.len(), 2);
    }

    #[test]
    fn pinned_targets_are_ignored_by_pin_aware_policies() {
        // The a4 bishop pins the c6 knight; Ne5 attacks it and the g4 rook.
        let fen = "4k3/8/2n5/8/B5r1/5N2/8/4K3 w - - 0 1";
        let basic = detect(ForkPolicy::Basic, fen, "Ne5").expect("basic counts the pinned knight");
        assert_eq!(basic.targets.len(), 2);
        assert!(detect(ForkPolicy::PinAware, fen, "Ne5").is_none());
    }

    #[test]
    fn counter_fork_is_reported() {
        // After Nd5 black answers ...Nc3, hitting the loose a2 rook and e4 bishop.
        let fork = detect(
            ForkPolicy::Basic,
            "7k/2r5/5b2/8/4B3/4N3/R7/1n5K w - - 0 1",
            "Nd5",
        )
        .expect("knight fork");
        assert!(fork.counter_fork_exposed);
        let counter = fork.counter_fork.expect("black has a knight reply");
        assert_eq!(counter.reply, "b1c3");
        assert_eq!(counter.targets, vec!["a2", "e4"]);
    }

    #[test]
    fn policy_parses_from_kebab_case() {
        assert_eq!("pin-aware".parse::<ForkPolicy>().unwrap(), ForkPolicy::PinAware);
        assert_eq!(" Basic ".parse::<ForkPolicy>().unwrap(), ForkPolicy::Basic);
        assert!("aggressive".parse::<ForkPolicy>().is_err());
        assert_eq!(ForkPolicy::default(), ForkPolicy::PinAndExchangeAware);
    }
}
