//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from Fetch Governor,
//! allowing users to import them with a single `use fetch_governor::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::config::{GovernorConfig, LimitConfig, Strategy};
pub use crate::error::GovernorError;
pub use crate::governor::{RateGovernor, SourceStatus};

// Background maintenance
pub use crate::cleanup::CleanupTask;

// Feature-gated exports
#[cfg(feature = "monitoring")]
pub use crate::metrics::GovernorMetrics;

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{init_tracing, TelemetryConfig};
