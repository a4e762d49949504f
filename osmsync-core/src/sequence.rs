//! Replication sequence numbers and the state documents that attest them.

use std::{fmt, num::ParseIntError, str::FromStr};

const STATE_SEQUENCE_KEY: &str = "sequenceNumber=";
const SHARD_WIDTH: usize = 9;

/// Monotonic cursor into the upstream replication feed.
///
/// # Examples
/// ```
/// use osmsync_core::SequenceNumber;
///
/// let sequence = SequenceNumber::new(6_177_383);
/// assert_eq!(sequence.sharded_path(), "006/177/383");
/// assert_eq!(sequence.next(), SequenceNumber::new(6_177_384));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// Wrap a raw sequence number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The sequence immediately after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Directory-sharded form used by the replication service.
    ///
    /// The decimal number is zero-padded to nine digits and split into three
    /// groups of three joined by `/`. Values wider than nine digits keep the
    /// surplus leading digits in the first group.
    #[must_use]
    pub fn sharded_path(self) -> String {
        let padded = format!("{:0width$}", self.0, width = SHARD_WIDTH);
        let split = padded.len() - 6;
        let (top, rest) = padded.split_at(split);
        let (middle, bottom) = rest.split_at(3);
        format!("{top}/{middle}/{bottom}")
    }
}

impl From<u64> for SequenceNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for SequenceNumber {
    type Err = ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse().map(Self)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsed replication state document.
///
/// Only the `sequenceNumber` field is consumed; timestamps and other keys are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRecord {
    /// Sequence number attested by the document.
    pub sequence: SequenceNumber,
}

impl StateRecord {
    /// Parse a `key=value` state document.
    ///
    /// Returns `None` when no well-formed `sequenceNumber` line is present.
    ///
    /// # Examples
    /// ```
    /// use osmsync_core::{SequenceNumber, StateRecord};
    ///
    /// let document = "#Sat Jan 06 12:00:02 UTC 2024\n\
    ///                 sequenceNumber=5912345\n\
    ///                 timestamp=2024-01-06T11\\:59\\:57Z\n";
    /// let record = StateRecord::parse(document).expect("document has a sequence");
    /// assert_eq!(record.sequence, SequenceNumber::new(5_912_345));
    /// ```
    #[must_use]
    pub fn parse(document: &str) -> Option<Self> {
        document
            .lines()
            .find_map(|line| line.trim().strip_prefix(STATE_SEQUENCE_KEY))
            .and_then(|value| value.parse().ok())
            .map(|sequence| Self { sequence })
    }

    /// Whether the document attests exactly `expected`.
    #[must_use]
    pub fn attests(&self, expected: SequenceNumber) -> bool {
        self.sequence == expected
    }
}
