//! HTTP client for the OSM minutely/hourly/daily replication feed.

use std::{fmt, io::Read, time::Duration};

use flate2::read::MultiGzDecoder;
use osmsync_core::{
    ReplicationError, ReplicationSource, SequenceNumber, StateRecord, TransportError,
};

use crate::http::{BaseUrl, BlockingClient, ClientBuildError, HttpClientConfig, sanitise_base_url};

/// Default replication service root.
pub const DEFAULT_REPLICATION_URL: &str = "https://planet.openstreetmap.org/replication";

/// Replication cadence directory below the service root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicationInterval {
    /// `minute/`
    #[default]
    Minute,
    /// `hour/`
    Hour,
    /// `day/`
    Day,
}

impl ReplicationInterval {
    /// Directory name on the replication server.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

impl fmt::Display for ReplicationInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown interval name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown replication interval {0:?}; expected minute, hour or day")]
pub struct UnknownInterval(pub String);

impl std::str::FromStr for ReplicationInterval {
    type Err = UnknownInterval;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            _ => Err(UnknownInterval(value.to_owned())),
        }
    }
}

/// Settings for [`HttpReplicationSource`].
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Service root; trailing slashes are trimmed.
    pub base_url: String,
    /// Cadence directory.
    pub interval: ReplicationInterval,
    /// Transport settings.
    pub http: HttpClientConfig,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REPLICATION_URL.to_owned(),
            interval: ReplicationInterval::default(),
            http: HttpClientConfig::default(),
        }
    }
}

impl ReplicationConfig {
    /// Configuration pointing at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Select the cadence directory.
    #[must_use]
    pub fn with_interval(mut self, interval: ReplicationInterval) -> Self {
        self.interval = interval;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.http = self.http.with_user_agent(user_agent);
        self
    }
}

/// Locations of the documents published for one replication feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationUrls {
    root: BaseUrl,
}

impl ReplicationUrls {
    /// URLs below `base` for the given cadence.
    #[must_use]
    pub fn new(base: &BaseUrl, interval: ReplicationInterval) -> Self {
        Self {
            root: BaseUrl::new(base.join(interval.as_str())),
        }
    }

    /// Global state document naming the newest sequence.
    #[must_use]
    pub fn latest_state(&self) -> String {
        self.root.join("state.txt")
    }

    /// Per-sequence state document.
    #[must_use]
    pub fn state(&self, sequence: SequenceNumber) -> String {
        self.root
            .join(&format!("{}.state.txt", sequence.sharded_path()))
    }

    /// Gzip-compressed osmChange document.
    #[must_use]
    pub fn diff(&self, sequence: SequenceNumber) -> String {
        self.root.join(&format!("{}.osc.gz", sequence.sharded_path()))
    }
}

/// [`ReplicationSource`] backed by the public replication HTTP service.
///
/// # Examples
/// ```no_run
/// use osmsync_core::ReplicationSource;
/// use osmsync_data::{HttpReplicationSource, ReplicationConfig};
///
/// let source = HttpReplicationSource::new(ReplicationConfig::default())?;
/// println!("latest: {}", source.latest_sequence()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct HttpReplicationSource {
    urls: ReplicationUrls,
    client: BlockingClient,
}

impl HttpReplicationSource {
    /// Build a source from `config`.
    ///
    /// # Errors
    /// Returns [`ClientBuildError`] when the base URL is not absolute or the
    /// HTTP client or runtime cannot be built.
    pub fn new(config: ReplicationConfig) -> Result<Self, ClientBuildError> {
        let base = sanitise_base_url(config.base_url, DEFAULT_REPLICATION_URL)?;
        Ok(Self {
            urls: ReplicationUrls::new(&base, config.interval),
            client: BlockingClient::new(&config.http)?,
        })
    }

    /// Document locations used by this source.
    #[must_use]
    pub const fn urls(&self) -> &ReplicationUrls {
        &self.urls
    }

}

impl ReplicationSource for HttpReplicationSource {
    fn latest_sequence(&self) -> Result<SequenceNumber, ReplicationError> {
        let url = self.urls.latest_state();
        latest_outcome(&url, self.client.get_bytes(&url))
    }

    fn state_published(&self, sequence: SequenceNumber) -> Result<bool, ReplicationError> {
        state_outcome(self.client.get_bytes(&self.urls.state(sequence)), sequence)
    }

    fn fetch_diff(&self, sequence: SequenceNumber) -> Result<Vec<u8>, ReplicationError> {
        let url = self.urls.diff(sequence);
        diff_outcome(&url, self.client.get_bytes(&url), sequence)
    }
}

/// Interpret the response to the latest-state request.
///
/// Every failure, including a document without a sequence number, means the
/// upstream is unavailable.
pub(crate) fn latest_outcome(
    url: &str,
    response: Result<Vec<u8>, TransportError>,
) -> Result<SequenceNumber, ReplicationError> {
    let body = response.map_err(|source| ReplicationError::UpstreamUnavailable { source })?;
    String::from_utf8(body)
        .ok()
        .as_deref()
        .and_then(StateRecord::parse)
        .map(|record| record.sequence)
        .ok_or_else(|| ReplicationError::UpstreamUnavailable {
            source: TransportError::Decode {
                url: url.to_owned(),
                message: "state document has no sequenceNumber".to_owned(),
            },
        })
}

/// Interpret the response to a per-sequence state request.
///
/// `404`, `410`, an undecodable body and a document attesting another
/// sequence all mean "not published".
pub(crate) fn state_outcome(
    response: Result<Vec<u8>, TransportError>,
    sequence: SequenceNumber,
) -> Result<bool, ReplicationError> {
    match response {
        Ok(body) => Ok(String::from_utf8(body)
            .ok()
            .as_deref()
            .and_then(StateRecord::parse)
            .is_some_and(|record| record.attests(sequence))),
        Err(err) if err.is_gone() || err.is_not_found() => Ok(false),
        Err(TransportError::Decode { .. }) => Ok(false),
        Err(source) => Err(ReplicationError::UpstreamUnavailable { source }),
    }
}

/// Interpret the response to a diff request.
///
/// `410` yields an empty payload; any other failure, including a corrupt
/// gzip stream, leaves the diff unavailable.
pub(crate) fn diff_outcome(
    url: &str,
    response: Result<Vec<u8>, TransportError>,
    sequence: SequenceNumber,
) -> Result<Vec<u8>, ReplicationError> {
    let compressed = match response {
        Ok(body) => body,
        Err(err) if err.is_gone() => return Ok(Vec::new()),
        Err(source) => return Err(ReplicationError::DiffUnavailable { sequence, source }),
    };
    gunzip(&compressed).map_err(|err| ReplicationError::DiffUnavailable {
        sequence,
        source: TransportError::Decode {
            url: url.to_owned(),
            message: err.to_string(),
        },
    })
}

/// Decompress a gzip stream held in memory, reading every member.
pub(crate) fn gunzip(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    MultiGzDecoder::new(compressed).read_to_end(&mut decoded)?;
    Ok(decoded)
}
