//! Internal implementation of identifier services.

use crate::{UuidError, UuidResult};
use chrono::{DateTime, Duration, Utc};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Ratchet's canonical UUID representation (32 lowercase hex characters, no hyphens).
///
/// Once constructed, the contained UUID is guaranteed to be in canonical form, so it
/// can be displayed, compared and hashed without further normalisation.
///
/// # Construction
/// - [`UuidService::new`] generates a fresh identifier (new visit sessions).
/// - [`UuidService::parse`] validates an externally supplied identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UuidService(Uuid);

impl Default for UuidService {
    fn default() -> Self {
        Self::new()
    }
}

impl UuidService {
    /// Generates a new random (version 4) UUID in canonical form.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a UUID string that must already be canonical.
    ///
    /// Hyphenated or uppercase forms are not normalised; callers must hand back the value
    /// exactly as it was issued.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("'{}': {}", input, e)))
    }

    /// Returns the inner `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is exactly 32 characters of `0-9a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Short, uppercase code for human-facing references, e.g. `ORD-1A2B3C4D`.
    ///
    /// Uses the first eight hex characters, so codes are not guaranteed unique across
    /// very large populations; they label records, they do not key them.
    pub fn short_code(&self, prefix: &str) -> String {
        let canonical = self.0.simple().to_string();
        format!("{}-{}", prefix, canonical[..8].to_uppercase())
    }
}

impl fmt::Display for UuidService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for UuidService {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UuidService::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for UuidService {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for UuidService {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        UuidService::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A time-prefixed unique identifier.
///
/// Format: `YYYYMMDDTHHMMSS.mmmZ-<canonical_uuid>`
///
/// Example: `20260111T143522.045Z-550e8400e29b41d4a716446655440000`
///
/// # Monotonicity
///
/// [`TimestampUuid::generate`] with the previous identifier returns a timestamp strictly
/// greater than the previous one (bumped by 1ms if the clock has not advanced). Called under
/// a per-session lock this keeps write-log entries ordered even when writes land within the
/// same millisecond.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimestampUuid {
    timestamp: DateTime<Utc>,
    uuid: UuidService,
}

impl TimestampUuid {
    /// Generate a new timestamp identifier, strictly after `last` if provided.
    pub fn generate(last: Option<&TimestampUuid>) -> Self {
        Self::generate_at(Utc::now(), last)
    }

    /// As [`TimestampUuid::generate`], with an explicit clock reading.
    pub fn generate_at(now: DateTime<Utc>, last: Option<&TimestampUuid>) -> Self {
        let timestamp = match last {
            Some(prev) if now <= prev.timestamp => prev.timestamp + Duration::milliseconds(1),
            _ => now,
        };

        Self {
            timestamp,
            uuid: UuidService::new(),
        }
    }

    /// Returns the timestamp component.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the UUID component.
    pub fn uuid(&self) -> &UuidService {
        &self.uuid
    }
}

impl PartialOrd for TimestampUuid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimestampUuid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.uuid.cmp(&other.uuid))
    }
}

impl FromStr for TimestampUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts_str, uuid_str) = s.split_once('-').ok_or_else(|| {
            UuidError::InvalidInput(format!("invalid timestamp UUID format: '{}'", s))
        })?;

        let ts_no_z = ts_str.strip_suffix('Z').ok_or_else(|| {
            UuidError::InvalidInput(format!("timestamp must end with 'Z': '{}'", ts_str))
        })?;

        let naive =
            chrono::NaiveDateTime::parse_from_str(ts_no_z, "%Y%m%dT%H%M%S%.3f").map_err(|e| {
                UuidError::InvalidInput(format!("invalid timestamp '{}': {}", ts_str, e))
            })?;

        Ok(Self {
            timestamp: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            uuid: UuidService::parse(uuid_str)?,
        })
    }
}

impl fmt::Display for TimestampUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            self.uuid
        )
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TimestampUuid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for TimestampUuid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_generates_canonical_uuid() {
        let canonical = UuidService::new().to_string();

        assert_eq!(canonical.len(), 32);
        assert!(UuidService::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_uuid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let parsed = UuidService::parse(canonical).unwrap();

        assert_eq!(parsed.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_uuid() {
        let result = UuidService::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_and_bad_lengths() {
        assert!(UuidService::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(UuidService::parse("550e8400e29b41d4a71644665544000").is_err());
        assert!(UuidService::parse("550e8400e29b41d4a7164466554400000").is_err());
        assert!(UuidService::parse("550e8400e29b41d4a716446655440zzz").is_err());
        assert!(UuidService::parse("").is_err());
    }

    #[test]
    fn test_short_code_uses_prefix_and_first_eight_hex() {
        let uuid = UuidService::parse("1a2b3c4d5e6f40008000000000000000").unwrap();
        assert_eq!(uuid.short_code("ORD"), "ORD-1A2B3C4D");
    }

    #[test]
    fn test_generate_is_strictly_monotonic_when_clock_stalls() {
        let now = Utc.with_ymd_and_hms(2026, 1, 11, 14, 35, 22).unwrap();
        let first = TimestampUuid::generate_at(now, None);
        let second = TimestampUuid::generate_at(now, Some(&first));
        let third = TimestampUuid::generate_at(now, Some(&second));

        assert!(second.timestamp() > first.timestamp());
        assert!(third.timestamp() > second.timestamp());
        assert!(first < second && second < third);
    }

    #[test]
    fn test_timestamp_uuid_display_parses_back() {
        let now = Utc.with_ymd_and_hms(2026, 1, 11, 14, 35, 22).unwrap();
        let uid = TimestampUuid::generate_at(now, None);
        let text = uid.to_string();

        assert!(text.starts_with("20260111T143522.000Z-"));
        let parsed: TimestampUuid = text.parse().unwrap();
        assert_eq!(parsed, uid);
    }

    #[test]
    fn test_timestamp_uuid_rejects_missing_zulu_suffix() {
        let result: Result<TimestampUuid, _> =
            "20260111T143522.045-550e8400e29b41d4a716446655440000".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_uuid_service_serde_as_string() {
        let uuid = UuidService::parse("550e8400e29b41d4a716446655440000").unwrap();
        let json = serde_json::to_string(&uuid).unwrap();
        assert_eq!(json, "\"550e8400e29b41d4a716446655440000\"");

        let back: UuidService = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uuid);
        assert!(serde_json::from_str::<UuidService>("\"not-a-uuid\"").is_err());
    }
}
