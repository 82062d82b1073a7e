//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Fetch Governor - Per-source request-rate governor
//!
//! Gates every outbound request a content fetcher makes to an external source
//! (news sites, social platforms, APIs) so each source's published rate limits
//! are respected.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use fetch_governor::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`RateGovernor`] - Per-source admission control
//! - [`GovernorConfig`] - Declarative source limits (YAML / TOML)
//! - [`SourceStatus`] - Point-in-time snapshot of a source
//! - [`GovernorError`] - Error types
//!
//! ## Algorithms
//!
//! Token bucket, sliding window and fixed window, selected once per governor
//! through [`Strategy`].
//!
//! ## Extensions (feature-gated)
//!
//! - Prometheus metrics (requires `monitoring` feature)
//! - Log subscriber initialisation (requires `telemetry` feature)
//!
//! # Examples
//!
//! ```rust
//! use fetch_governor::prelude::*;
//! use std::time::Duration;
//!
//! let governor = RateGovernor::new(Strategy::SlidingWindow);
//! governor.set_limit("reddit", 60, Duration::from_secs(60), None).unwrap();
//!
//! if governor.check_limit("reddit", 1) {
//!     // issue the request
//! }
//!
//! let status = governor.get_status("reddit").unwrap();
//! assert_eq!(status.remaining, 59);
//! ```
//!
//! # Features
//!
//! - **Three algorithms**: Token bucket with burst, sliding window log, fixed window counter
//! - **Open by default**: Sources without a configured limit are never throttled
//! - **Blocking and async waits**: Park until admitted, with an optional deadline
//! - **Background cleanup**: Periodic eviction of expired window state
//! - **Monitoring**: Optional Prometheus counters per source and outcome

pub mod prelude;

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod governor;
pub mod limiters;
#[cfg(feature = "monitoring")]
pub mod metrics;
#[cfg(feature = "telemetry")]
pub mod telemetry;

// 重新导出常用类型
pub use cleanup::CleanupTask;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GovernorConfig, LimitConfig, SourceLimit, Strategy};
pub use error::GovernorError;
pub use governor::{GovernorBuilder, GovernorStats, RateGovernor, SourceStatus};
#[cfg(feature = "monitoring")]
pub use metrics::GovernorMetrics;
#[cfg(feature = "telemetry")]
pub use telemetry::{init_tracing, TelemetryConfig};
