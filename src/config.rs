//! Configuration constants for the DVF loader
//!
//! This module centralizes all tunable parameters and constants used throughout
//! the application.

use std::time::Duration;

// ============================================================================
// Connection Configuration
// ============================================================================

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The load is a single long-lived writer, so a handful of connections is
/// plenty (one for the COPY stream, one for setup and optimization statements).
pub const MAX_POOL_SIZE: u32 = 4;

// ============================================================================
// Readiness Probe
// ============================================================================

/// Number of `SELECT 1` attempts before giving up on the database.
pub const READY_PROBE_ATTEMPTS: u32 = 30;

/// Delay between readiness probe attempts.
pub const READY_PROBE_DELAY: Duration = Duration::from_secs(2);

// ============================================================================
// Ingestion Configuration
// ============================================================================

/// Size at which the in-memory COPY buffer is flushed to the server.
///
/// 1MB keeps memory usage bounded regardless of input file size while still
/// amortizing the per-message overhead of the COPY protocol. A multi-million
/// row DVF export streams through in 1MB slices.
pub const COPY_BUFFER_SIZE: usize = 1024 * 1024; // 1 MB

/// Number of rows between progress bar position updates during a load.
pub const PROGRESS_UPDATE_ROWS: u64 = 10_000;
