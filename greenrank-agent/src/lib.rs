//! greenrank-agent - Normalization and Ranking Pipeline
//!
//! Converts messy per-vendor operational records into validated normalized
//! events through a bounded-retry Planner → Executor → Critic loop, folds
//! them into monthly per-company rollups, and derives a composite green
//! score ranking.
//!
//! The library exposes the pipeline to collaborator layers as plain
//! structured values; HTTP surfaces, persistence, and upload handling live
//! outside this crate.

pub mod agent;
pub mod audit;
pub mod demo;
pub mod metrics;
pub mod normalize;
pub mod ranking;
pub mod rollup;
pub mod types;
pub mod validate;

pub use agent::{BatchOutcome, RankerAgent, RecordOutcome};
pub use types::{NormalizationPlan, PlanAction, PlanStep, Violation};
