//! Blocking HTTP access shared by the network adapters.
//!
//! The collaborator traits in `osmsync-core` are synchronous so the driver
//! can stay a plain loop. [`BlockingClient`] bridges `reqwest`'s async API to
//! them by blocking on a Tokio runtime it owns.
//!
//! # Runtime behaviour
//!
//! Outside any Tokio runtime the client blocks on its own current-thread
//! runtime. Inside a multi-threaded runtime (detected via
//! [`Handle::try_current()`] and [`RuntimeFlavor::MultiThread`]) it reuses that
//! runtime's handle through [`tokio::task::block_in_place`]. Inside a
//! `current_thread` runtime it falls back to its own runtime.

use std::{fmt, future::Future, ops::Deref, time::Duration};

use osmsync_core::TransportError;
use reqwest::{Client, RequestBuilder, header::CONTENT_TYPE};
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

/// Default user agent for outgoing requests.
pub const DEFAULT_USER_AGENT: &str = "osmsync/0.1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error raised while constructing an HTTP adapter.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// A configured URL could not be parsed.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        /// Offending value.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
}

/// Transport settings shared by every HTTP adapter.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpClientConfig {
    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Base URL of an HTTP endpoint, without trailing slashes.
///
/// # Examples
/// ```
/// use osmsync_data::BaseUrl;
///
/// let url = BaseUrl::new("https://planet.openstreetmap.org/replication");
/// assert_eq!(url.join("minute/state.txt"), "https://planet.openstreetmap.org/replication/minute/state.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Wrap a URL verbatim.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Append `path` after a single `/`.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }

    /// Consume the wrapper and return the inner [`String`].
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for BaseUrl {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim trailing slashes and fall back to `default` when nothing remains.
///
/// The result must parse as an absolute URL.
pub(crate) fn sanitise_base_url(
    url: impl Into<String>,
    default: &str,
) -> Result<BaseUrl, ClientBuildError> {
    let raw = url.into();
    let trimmed = raw.trim().trim_end_matches('/');
    let chosen = if trimmed.is_empty() { default } else { trimmed };
    url::Url::parse(chosen).map_err(|source| ClientBuildError::InvalidUrl {
        url: chosen.to_owned(),
        source,
    })?;
    Ok(BaseUrl::new(chosen))
}

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `reqwest` client paired with the runtime that drives it.
pub(crate) struct BlockingClient {
    client: Client,
    runtime: Runtime,
    timeout: Duration,
}

impl fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingClient")
            .field("client", &self.client)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BlockingClient {
    pub(crate) fn new(config: &HttpClientConfig) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(ClientBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientBuildError::Runtime)?;
        Ok(Self {
            client,
            runtime,
            timeout: config.timeout,
        })
    }

    pub(crate) const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET` `url` and return the body of a successful response.
    pub(crate) fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.block_on(self.send(self.client.get(url), url))
    }

    /// `POST` `body` to `url` with the given content type.
    pub(crate) fn post(
        &self,
        url: &str,
        content_type: &str,
        body: String,
        credentials: Option<&Credentials>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body);
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.user, Some(&credentials.password));
        }
        self.block_on(self.send(request, url)).map(drop)
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_owned());
            return Err(TransportError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message,
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?;
        Ok(body.to_vec())
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }

    /// Convert a reqwest error to a [`TransportError`].
    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return TransportError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        TransportError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DEFAULT: &str = "https://planet.openstreetmap.org/replication";

    #[rstest]
    #[case("https://example.org/replication/", "https://example.org/replication")]
    #[case("https://example.org///", "https://example.org")]
    #[case("", DEFAULT)]
    #[case("  ", DEFAULT)]
    fn sanitises_base_urls(#[case] raw: &str, #[case] expected: &str) {
        let url = sanitise_base_url(raw, DEFAULT).expect("valid URL");
        assert_eq!(url.as_ref(), expected);
    }

    #[rstest]
    fn rejects_relative_urls() {
        let err = sanitise_base_url("replication", DEFAULT).expect_err("not absolute");
        assert!(matches!(err, ClientBuildError::InvalidUrl { .. }));
    }

    #[rstest]
    fn joins_paths_with_one_separator() {
        let url = BaseUrl::new("https://example.org/api/0.6/node");
        assert_eq!(url.join("/5"), "https://example.org/api/0.6/node/5");
    }

    #[rstest]
    fn credentials_hide_password() {
        let credentials = Credentials {
            user: "demo".into(),
            password: "secret".into(),
        };
        assert!(!format!("{credentials:?}").contains("secret"));
    }

    #[rstest]
    fn config_builder_pattern() {
        let config = HttpClientConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent/1.0");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent/1.0");
    }

    #[rstest]
    fn unreachable_host_is_a_network_error() {
        let client = BlockingClient::new(
            &HttpClientConfig::default().with_timeout(Duration::from_secs(2)),
        )
        .expect("client builds");
        let err = client
            .get_bytes("http://127.0.0.1:9/state.txt")
            .expect_err("nothing listens on the discard port");
        assert!(matches!(
            err,
            TransportError::Network { .. } | TransportError::Timeout { .. }
        ));
    }
}
