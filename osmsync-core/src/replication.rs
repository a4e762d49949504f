//! Access to the upstream replication feed.

use thiserror::Error;

use crate::SequenceNumber;

/// HTTP status signalling that a replication resource was withdrawn.
const STATUS_GONE: u16 = 410;
/// HTTP status signalling that a resource has not been published yet.
const STATUS_NOT_FOUND: u16 = 404;

/// Failure while talking to an HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// The request did not produce a response.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error description.
        message: String,
    },
    /// The request exceeded its deadline.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured deadline in seconds.
        timeout_secs: u64,
    },
    /// The response body could not be decoded.
    #[error("undecodable response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder error description.
        message: String,
    },
}

impl TransportError {
    /// HTTP status code when the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network { .. } | Self::Timeout { .. } | Self::Decode { .. } => None,
        }
    }

    /// Whether the resource is permanently gone (HTTP 410).
    #[must_use]
    pub fn is_gone(&self) -> bool {
        self.status() == Some(STATUS_GONE)
    }

    /// Whether the resource does not exist yet (HTTP 404).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(STATUS_NOT_FOUND)
    }
}

/// Errors raised by a [`ReplicationSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ReplicationError {
    /// The state endpoint could not be reached or answered nonsense.
    #[error("replication service unavailable: {source}")]
    UpstreamUnavailable {
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// A diff could not be downloaded or decompressed.
    #[error("diff {sequence} unavailable: {source}")]
    DiffUnavailable {
        /// Sequence whose diff failed.
        sequence: SequenceNumber,
        /// Transport or decompression failure.
        #[source]
        source: TransportError,
    },
}

/// Source of replication state and diffs.
///
/// Implementations translate `410 Gone` into the neutral results documented
/// on each method so callers never see it as an error.
///
/// # Examples
///
/// ```
/// use osmsync_core::{ReplicationError, ReplicationSource, SequenceNumber};
///
/// struct Fixed;
///
/// impl ReplicationSource for Fixed {
///     fn latest_sequence(&self) -> Result<SequenceNumber, ReplicationError> {
///         Ok(SequenceNumber::new(7))
///     }
///
///     fn state_published(&self, sequence: SequenceNumber) -> Result<bool, ReplicationError> {
///         Ok(sequence.get() <= 7)
///     }
///
///     fn fetch_diff(&self, _sequence: SequenceNumber) -> Result<Vec<u8>, ReplicationError> {
///         Ok(b"<osmChange version=\"0.6\"/>".to_vec())
///     }
/// }
///
/// assert_eq!(Fixed.latest_sequence()?, SequenceNumber::new(7));
/// # Ok::<(), ReplicationError>(())
/// ```
pub trait ReplicationSource {
    /// Sequence number of the newest published diff.
    ///
    /// # Errors
    /// Returns [`ReplicationError::UpstreamUnavailable`] when the state
    /// document cannot be fetched or carries no sequence number.
    fn latest_sequence(&self) -> Result<SequenceNumber, ReplicationError>;

    /// Whether the per-sequence state document exists and attests `sequence`.
    ///
    /// Missing, withdrawn or mismatched documents yield `Ok(false)`.
    ///
    /// # Errors
    /// Returns [`ReplicationError::UpstreamUnavailable`] on other transport
    /// failures.
    fn state_published(&self, sequence: SequenceNumber) -> Result<bool, ReplicationError>;

    /// Decompressed osmChange bytes for `sequence`.
    ///
    /// A withdrawn diff yields an empty payload.
    ///
    /// # Errors
    /// Returns [`ReplicationError::DiffUnavailable`] on transport or
    /// decompression failures.
    fn fetch_diff(&self, sequence: SequenceNumber) -> Result<Vec<u8>, ReplicationError>;
}

impl<T: ReplicationSource + ?Sized> ReplicationSource for &T {
    fn latest_sequence(&self) -> Result<SequenceNumber, ReplicationError> {
        (**self).latest_sequence()
    }

    fn state_published(&self, sequence: SequenceNumber) -> Result<bool, ReplicationError> {
        (**self).state_published(sequence)
    }

    fn fetch_diff(&self, sequence: SequenceNumber) -> Result<Vec<u8>, ReplicationError> {
        (**self).fetch_diff(sequence)
    }
}
