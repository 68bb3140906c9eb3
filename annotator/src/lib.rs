//! Post-game annotation: replays a game and reports tactical, structural and
//! evaluation-based observations about it.

pub mod board;
pub mod config;
pub mod detectors;
pub mod error;
pub mod eval_cache;
pub mod opening;
pub mod report;
pub mod termination;
pub mod timeline;

pub use config::{AnnotatorConfig, BudgetSetting};
pub use detectors::ForkPolicy;
pub use error::{AnnotatorError, Result};
pub use eval_cache::CachedEvaluator;
pub use opening::{CatalogDiagnostic, OpeningCatalog, OpeningMatch, OpeningRecord};
pub use report::{Annotator, GameReport};
pub use termination::{GameOutcome, Termination};
pub use timeline::{Timeline, TimelineEntry};
