//! Annotator tunables.
//!
//! Every threshold and search budget the detectors use lives here as a named
//! field. Each has a compile-time default and can be overridden at runtime via
//! a dedicated `ANNOTATOR_*` environment variable; values that fail to parse
//! fall back to the default.

use std::str::FromStr;
use std::time::Duration;

use engine::SearchBudget;
use serde::{Deserialize, Serialize};

use crate::detectors::fork_detector::ForkPolicy;

/// Minimum evaluation swing (centipawns) for a reply to count as a zwischenzug.
pub const DEFAULT_ZWISCHENZUG_THRESHOLD_CP: i32 = 50;

/// Centipawn value standing in for "mate" when comparing scores.
pub const DEFAULT_MATE_SCORE_CP: i32 = 10_000;

/// Every trial move must fall this far below the baseline for a zugzwang.
pub const DEFAULT_ZUGZWANG_MARGIN_CP: i32 = 0;

/// Scores within this band of zero count as "close to a draw" when judging a resignation.
pub const DEFAULT_RESIGNATION_DRAW_BAND_CP: i32 = 50;

const DEFAULT_ZWISCHENZUG_MOVETIME_MS: u64 = 100;
const DEFAULT_ZUGZWANG_BASELINE_DEPTH: u8 = 20;
const DEFAULT_ZUGZWANG_TRIAL_DEPTH: u8 = 15;
const DEFAULT_RESIGNATION_MOVETIME_MS: u64 = 1000;

/// Serializable mirror of [`SearchBudget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetSetting {
    Depth { depth: u8 },
    MoveTime { millis: u64 },
}

impl BudgetSetting {
    pub fn budget(&self) -> SearchBudget {
        match *self {
            Self::Depth { depth } => SearchBudget::Depth(depth),
            Self::MoveTime { millis } => SearchBudget::MoveTime(Duration::from_millis(millis)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    pub fork_policy: ForkPolicy,
    pub zwischenzug_threshold_cp: i32,
    pub mate_score_cp: i32,
    pub zugzwang_margin_cp: i32,
    pub resignation_draw_band_cp: i32,
    /// Also used for the post-move sample attached to material threats.
    pub zwischenzug_budget: BudgetSetting,
    pub zugzwang_baseline_budget: BudgetSetting,
    pub zugzwang_trial_budget: BudgetSetting,
    pub resignation_budget: BudgetSetting,
    pub enable_zwischenzug: bool,
    pub enable_zugzwang: bool,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            fork_policy: ForkPolicy::default(),
            zwischenzug_threshold_cp: DEFAULT_ZWISCHENZUG_THRESHOLD_CP,
            mate_score_cp: DEFAULT_MATE_SCORE_CP,
            zugzwang_margin_cp: DEFAULT_ZUGZWANG_MARGIN_CP,
            resignation_draw_band_cp: DEFAULT_RESIGNATION_DRAW_BAND_CP,
            zwischenzug_budget: BudgetSetting::MoveTime {
                millis: DEFAULT_ZWISCHENZUG_MOVETIME_MS,
            },
            zugzwang_baseline_budget: BudgetSetting::Depth {
                depth: DEFAULT_ZUGZWANG_BASELINE_DEPTH,
            },
            zugzwang_trial_budget: BudgetSetting::Depth {
                depth: DEFAULT_ZUGZWANG_TRIAL_DEPTH,
            },
            resignation_budget: BudgetSetting::MoveTime {
                millis: DEFAULT_RESIGNATION_MOVETIME_MS,
            },
            enable_zwischenzug: true,
            enable_zugzwang: true,
        }
    }
}

impl AnnotatorConfig {
    /// Defaults overridden by any `ANNOTATOR_*` variables that are set and parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let number = |key: &str, default: i32| -> i32 {
            parsed(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };
        let flag = |key: &str, default: bool| -> bool {
            parsed(key).and_then(|v| parse_flag(&v)).unwrap_or(default)
        };
        let movetime = |key: &str, default: BudgetSetting| -> BudgetSetting {
            parsed(key)
                .and_then(|v| v.parse().ok())
                .map(|millis| BudgetSetting::MoveTime { millis })
                .unwrap_or(default)
        };
        let depth = |key: &str, default: BudgetSetting| -> BudgetSetting {
            parsed(key)
                .and_then(|v| v.parse().ok())
                .map(|depth| BudgetSetting::Depth { depth })
                .unwrap_or(default)
        };

        Self {
            fork_policy: parsed("ANNOTATOR_FORK_POLICY")
                .and_then(|v| ForkPolicy::from_str(&v).ok())
                .unwrap_or(defaults.fork_policy),
            zwischenzug_threshold_cp: number(
                "ANNOTATOR_ZWISCHENZUG_THRESHOLD_CP",
                defaults.zwischenzug_threshold_cp,
            ),
            mate_score_cp: number("ANNOTATOR_MATE_SCORE_CP", defaults.mate_score_cp),
            zugzwang_margin_cp: number("ANNOTATOR_ZUGZWANG_MARGIN_CP", defaults.zugzwang_margin_cp),
            resignation_draw_band_cp: number(
                "ANNOTATOR_RESIGNATION_DRAW_BAND_CP",
                defaults.resignation_draw_band_cp,
            ),
            zwischenzug_budget: movetime(
                "ANNOTATOR_ZWISCHENZUG_MOVETIME_MS",
                defaults.zwischenzug_budget,
            ),
            zugzwang_baseline_budget: depth(
                "ANNOTATOR_ZUGZWANG_BASELINE_DEPTH",
                defaults.zugzwang_baseline_budget,
            ),
            zugzwang_trial_budget: depth(
                "ANNOTATOR_ZUGZWANG_TRIAL_DEPTH",
                defaults.zugzwang_trial_budget,
            ),
            resignation_budget: movetime(
                "ANNOTATOR_RESIGNATION_MOVETIME_MS",
                defaults.resignation_budget,
            ),
            enable_zwischenzug: flag("ANNOTATOR_ENABLE_ZWISCHENZUG", defaults.enable_zwischenzug),
            enable_zugzwang: flag("ANNOTATOR_ENABLE_ZUGZWANG", defaults.enable_zugzwang),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = AnnotatorConfig::from_lookup(|_| None);
        assert_eq!(config, AnnotatorConfig::default());
        assert_eq!(config.fork_policy, ForkPolicy::PinAndExchangeAware);
        assert_eq!(config.zwischenzug_threshold_cp, 50);
        assert_eq!(config.mate_score_cp, 10_000);
    }

    #[test]
    fn overrides_are_applied() {
        let config = AnnotatorConfig::from_lookup(lookup(&[
            ("ANNOTATOR_FORK_POLICY", "basic"),
            ("ANNOTATOR_ZWISCHENZUG_THRESHOLD_CP", "80"),
            ("ANNOTATOR_ZUGZWANG_TRIAL_DEPTH", "9"),
            ("ANNOTATOR_ENABLE_ZUGZWANG", "off"),
        ]));
        assert_eq!(config.fork_policy, ForkPolicy::Basic);
        assert_eq!(config.zwischenzug_threshold_cp, 80);
        assert_eq!(config.zugzwang_trial_budget, BudgetSetting::Depth { depth: 9 });
        assert!(!config.enable_zugzwang);
    }

    #[test]
    fn unparseable_values_fall_back_to_defaults() {
        let config = AnnotatorConfig::from_lookup(lookup(&[
            ("ANNOTATOR_MATE_SCORE_CP", "lots"),
            ("ANNOTATOR_FORK_POLICY", "aggressive"),
            ("ANNOTATOR_ENABLE_ZWISCHENZUG", "maybe"),
        ]));
        assert_eq!(config.mate_score_cp, DEFAULT_MATE_SCORE_CP);
        assert_eq!(config.fork_policy, ForkPolicy::PinAndExchangeAware);
        assert!(config.enable_zwischenzug);
    }

    #[test]
    fn budget_setting_maps_to_search_budget() {
        let budget = BudgetSetting::MoveTime { millis: 250 }.budget();
        assert_eq!(budget, SearchBudget::MoveTime(Duration::from_millis(250)));
    }
}
