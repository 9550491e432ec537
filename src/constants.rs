//! Application-wide constants for panegram.
//!
//! This module centralizes magic numbers so the limits that shape the
//! bridge's behavior are discoverable in one place. Constants are grouped
//! by domain with documentation explaining their purpose.

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for a single `wezterm cli` subprocess invocation.
///
/// Pane enumeration and keystroke injection shell out to the wezterm CLI.
/// A hung or missing binary must not stall the tick; on timeout the call
/// degrades to an empty result and the next tick retries naturally.
pub const WEZTERM_CLI_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client request timeout for Telegram Bot API calls.
///
/// Must exceed [`UPDATE_POLL_TIMEOUT_SECS`] or long polling would be cut
/// off by the client before the server responds.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Long-poll timeout (seconds) passed to Telegram `getUpdates`.
///
/// Short enough that shutdown signals are observed promptly between polls.
pub const UPDATE_POLL_TIMEOUT_SECS: u64 = 5;

/// Delay between typing text into a pane and submitting the enter keypress.
///
/// wezterm applies pasted text asynchronously; submitting immediately can
/// race the paste and drop the carriage return.
pub const SEND_INPUT_SUBMIT_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// Polling
// ============================================================================

/// Default tick interval in seconds when the config does not override it.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

// ============================================================================
// Message shaping
// ============================================================================

/// Maximum characters per outbound chat message chunk.
///
/// Telegram rejects messages over 4096 characters; 4000 leaves headroom
/// for entity expansion.
pub const CHUNK_LIMIT: usize = 4000;

/// Maximum characters for a forum topic title.
pub const TOPIC_TITLE_LIMIT: usize = 128;

// ============================================================================
// State bounds
// ============================================================================

/// Maximum retained entries in the outbound-message → pane reply map.
///
/// Entries beyond this are evicted oldest-first. A reply to an evicted
/// message falls back to primary-pane routing, same as a reply to a
/// message that predates the bridge.
pub const REPLY_MAP_CAPACITY: usize = 4096;

/// How long the Codex rollout-file index is trusted before a rescan.
pub const ROLLOUT_INDEX_TTL: Duration = Duration::from_secs(30);

/// How many daily session directories (today backwards) the Codex rollout
/// scan covers.
pub const ROLLOUT_SCAN_DAYS: i64 = 2;
