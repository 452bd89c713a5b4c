//! Attune Engine - Personalization and nudge governance for the Attune backend
//!
//! The engine decides which wellness nudges reach a user and which are held
//! back, through a deterministic pipeline: baseline tracking → recovery
//! scoring → minimum-viable-day detection → memory retrieval → confidence
//! scoring → suppression.
//!
//! ## Modules
//!
//! - **baseline**: Rolling per-signal baselines (mean/stddev over a window)
//! - **recovery**: Daily readiness score with edge-case detection
//! - **memory**: Decaying per-user preference and feedback memory
//! - **confidence**: Multi-factor candidate confidence scoring
//! - **mvd**: Minimum viable day state machine and protocol allowlists
//! - **suppression**: Ordered delivery rules with priority overrides
//! - **engine**: Stateful orchestration of the full pipeline

pub mod baseline;
pub mod confidence;
pub mod engine;
pub mod error;
pub mod memory;
pub mod mvd;
pub mod narrative;
pub mod recovery;
pub mod suppression;
pub mod types;

pub use engine::{EngineConfig, EvaluationRequest, GovernanceDecision, GovernanceEngine};
pub use error::EngineError;
pub use recovery::{RecoveryOutcome, RecoveryResult, RecoveryScorer};
pub use suppression::{SuppressionDecision, SuppressionEngine};
pub use types::{DailyMetrics, NudgeCandidate, PriorityClass, RecoveryZone};

/// Engine version embedded in decision payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for decision payloads
pub const PRODUCER_NAME: &str = "attune-engine";
