//! Live-data API access for resolving way nodes.

use std::time::Duration;

use osmsync_core::{ElementId, NodeSource, TransportError};

use crate::http::{BaseUrl, BlockingClient, ClientBuildError, HttpClientConfig, sanitise_base_url};

/// Default endpoint serving single nodes.
pub const DEFAULT_NODE_URL: &str = "https://api.openstreetmap.org/api/0.6/node";

/// [`NodeSource`] that requests `{base}/{id}` from the OSM editing API.
#[derive(Debug)]
pub struct HttpNodeSource {
    base: BaseUrl,
    client: BlockingClient,
}

impl HttpNodeSource {
    /// Build a node source rooted at `base_url`.
    ///
    /// An empty base falls back to [`DEFAULT_NODE_URL`].
    ///
    /// # Errors
    /// Returns [`ClientBuildError`] when the URL is not absolute or the HTTP
    /// client cannot be built.
    pub fn new(base_url: impl Into<String>, http: &HttpClientConfig) -> Result<Self, ClientBuildError> {
        Ok(Self {
            base: sanitise_base_url(base_url, DEFAULT_NODE_URL)?,
            client: BlockingClient::new(http)?,
        })
    }

    /// Node source against the public API with default transport settings.
    ///
    /// # Errors
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn with_defaults() -> Result<Self, ClientBuildError> {
        Self::new(DEFAULT_NODE_URL, &HttpClientConfig::default())
    }

    /// URL requested for node `id`.
    #[must_use]
    pub fn node_url(&self, id: ElementId) -> String {
        self.base.join(&id.to_string())
    }

    /// Request timeout applied to every fetch.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.client.timeout()
    }
}

impl NodeSource for HttpNodeSource {
    fn fetch_node(&self, id: ElementId) -> Result<Vec<u8>, TransportError> {
        self.client.get_bytes(&self.node_url(id))
    }
}
