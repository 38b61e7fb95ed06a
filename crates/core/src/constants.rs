//! Constants used throughout the visit engine.
//!
//! Defaults for configuration tables live in [`crate::config`]; the values here are the
//! fixed limits and identifier prefixes that are not configurable.

/// Number of readings the vitals trend window covers when no override is configured.
pub const DEFAULT_TREND_WINDOW: usize = 5;

/// A slope needs at least two points.
pub const MIN_TREND_WINDOW: usize = 2;

/// Default number of results returned by patient search.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Default number of coordination notes returned by the notes listing.
pub const DEFAULT_NOTES_LIMIT: usize = 20;

/// Default number of points returned by the vital trend listing.
pub const DEFAULT_TREND_POINTS: usize = 10;

/// Highest pain score on the 0-10 scale.
pub const MAX_PAIN_SCORE: f64 = 10.0;

/// WAT scores above this value raise a wound warning.
pub const WAT_ATTENTION_THRESHOLD: u8 = 3;

/// Prefix for medication identifiers (`MED-004`).
pub const MEDICATION_ID_PREFIX: &str = "MED";

/// Prefix for wound identifiers (`W-002`).
pub const WOUND_ID_PREFIX: &str = "W";

/// Prefix for order identifiers (`ORD-1A2B3C4D`).
pub const ORDER_ID_PREFIX: &str = "ORD";

/// Prefix for coordination note identifiers (`NOTE-1A2B3C4D`).
pub const NOTE_ID_PREFIX: &str = "NOTE";

/// Prefix for archived visit identifiers (`V-20261019-003`).
pub const VISIT_ID_PREFIX: &str = "V";
