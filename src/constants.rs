//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for the governor.
//!
//! All magic numbers used by the admission algorithms, the blocking waits
//! and the cleanup task are defined here.

use std::time::Duration;

/// Default cost of a single admission request.
///
/// Used by callers that do not weight their requests.
pub const DEFAULT_COST: u64 = 1;

// ============================================================================
// Wait Constants
// ============================================================================

/// Upper bound for a single sleep inside `wait_if_needed` (1 second).
///
/// Waiters re-check the state at least this often so that time-based
/// quota recovery is observed even when nobody signals the condition.
pub const MAX_WAIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lower bound for a single sleep inside `wait_if_needed` (1 millisecond).
///
/// Prevents a hot loop when the computed retry instant is already due.
pub const MIN_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ============================================================================
// Cleanup Constants
// ============================================================================

/// Default interval of the periodic cleanup task (30 seconds).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);
