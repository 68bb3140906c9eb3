//! Board geometry shared by the detectors.

pub mod attack_map;
pub mod helpers;

pub use attack_map::{AttackMap, Attacker};
pub use helpers::{material_value, piece_attacks, pinned_to_king, square_name};
