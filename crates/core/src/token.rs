//! Version tokens
//!
//! A token names one version of a tracked file and establishes
//! creation order. The stamp is a fixed-width UTC timestamp at
//! millisecond granularity, so lexicographic order over version file
//! names equals chronological order. When two versions of the same
//! file land on the same millisecond, the store disambiguates with a
//! numeric suffix that sorts after the bare stamp.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// Stamp layout: `20260807-143025123` (UTC, fixed width)
const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S%3f";
const STAMP_LEN: usize = 18;

/// Creation-ordered identifier embedded in a version file name
///
/// Ordering is derived: stamp first (lexicographic, which is
/// chronological for the fixed-width format), then suffix. A suffix
/// of zero renders as no suffix at all.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionToken {
    stamp: String,
    suffix: u32,
}

impl VersionToken {
    /// Token for the current wall-clock time
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Token for an explicit instant
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            stamp: at.format(STAMP_FORMAT).to_string(),
            suffix: 0,
        }
    }

    /// The next token sorting directly after this one within the same
    /// millisecond
    pub fn successor(&self) -> Self {
        Self {
            stamp: self.stamp.clone(),
            suffix: self.suffix + 1,
        }
    }

    /// Milliseconds since the Unix epoch encoded in the stamp
    pub fn timestamp_ms(&self) -> Option<u64> {
        let date = NaiveDate::from_ymd_opt(
            self.stamp[0..4].parse().ok()?,
            self.stamp[4..6].parse().ok()?,
            self.stamp[6..8].parse().ok()?,
        )?;
        let datetime = date.and_hms_milli_opt(
            self.stamp[9..11].parse().ok()?,
            self.stamp[11..13].parse().ok()?,
            self.stamp[13..15].parse().ok()?,
            self.stamp[15..18].parse().ok()?,
        )?;
        u64::try_from(datetime.and_utc().timestamp_millis()).ok()
    }

    /// Parse a token as it appears at the end of a version file name
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() < STAMP_LEN || !s.is_char_boundary(STAMP_LEN) {
            return None;
        }
        let (stamp, rest) = s.split_at(STAMP_LEN);
        let bytes = stamp.as_bytes();
        if bytes[8] != b'-'
            || !bytes[..8].iter().all(|b| b.is_ascii_digit())
            || !bytes[9..].iter().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let suffix = if rest.is_empty() {
            0
        } else {
            let digits = rest.strip_prefix('-')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        };

        let token = Self {
            stamp: stamp.to_string(),
            suffix,
        };
        // Digit shape alone is not enough: the fields must form a
        // real calendar time.
        token.timestamp_ms()?;
        Some(token)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.suffix == 0 {
            write!(f, "{}", self.stamp)
        } else {
            write!(f, "{}-{}", self.stamp, self.suffix)
        }
    }
}

/// Split a version file name into (original name, token)
///
/// Returns None when the name does not end in `.<token>`, i.e. it is
/// not something the store produced.
pub fn split_version_name(file_name: &str) -> Option<(&str, VersionToken)> {
    let dot = file_name.rfind('.')?;
    let token = VersionToken::parse(&file_name[dot + 1..])?;
    if dot == 0 {
        return None;
    }
    Some((&file_name[..dot], token))
}
