//! SPARQL 1.1 Update emitter.
//!
//! Every request is a single `POST` with content type
//! `application/sparql-update` whose body starts with the namespace preamble
//! in [`PREFIXES`], so subjects and converter output can use prefixed names.

use osmsync_core::{ObjectSubjects, StoreError, Triples, UpdateEmitter};
use thiserror::Error;

use crate::http::{BlockingClient, ClientBuildError, Credentials, HttpClientConfig};

/// Content type of SPARQL Update requests.
pub const SPARQL_UPDATE_CONTENT_TYPE: &str = "application/sparql-update";

/// Namespace declarations prepended to every update.
pub const PREFIXES: &str = "\
PREFIX ohmnode: <https://www.openhistoricalmap.org/node/>
PREFIX osmrel: <https://www.openstreetmap.org/relation/>
PREFIX osmnode: <https://www.openstreetmap.org/node/>
PREFIX osmkey: <https://www.openstreetmap.org/wiki/Key:>
PREFIX osmway: <https://www.openstreetmap.org/way/>
PREFIX osmmeta: <https://www.openstreetmap.org/meta/>
PREFIX osm: <https://www.openstreetmap.org/>
PREFIX osm2rdfmeta: <https://osm2rdf.cs.uni-freiburg.de/rdf/meta#>
PREFIX ohmrel: <https://www.openhistoricalmap.org/relation/>
PREFIX osm2rdfmember: <https://osm2rdf.cs.uni-freiburg.de/rdf/member#>
PREFIX osm2rdfkey: <https://osm2rdf.cs.uni-freiburg.de/rdf/key#>
PREFIX osm2rdfgeom: <https://osm2rdf.cs.uni-freiburg.de/rdf/geom#>
PREFIX ohmway: <https://www.openhistoricalmap.org/way/>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
PREFIX ohm: <https://www.openhistoricalmap.org/>
PREFIX wd: <http://www.wikidata.org/entity/>
PREFIX osm2rdf: <https://osm2rdf.cs.uni-freiburg.de/rdf#>
PREFIX ogc: <http://www.opengis.net/rdf#>
PREFIX geo: <http://www.opengis.net/ont/geosparql#>
";

/// Render the update removing every statement about one object.
///
/// # Examples
/// ```
/// use osmsync_core::{ElementId, ElementKind, ObjectSubjects};
/// use osmsync_data::sparql::delete_update;
///
/// let update = delete_update(&ObjectSubjects::of(ElementKind::Way, ElementId::new(7)));
/// assert!(update.ends_with(
///     "DELETE { ?s ?p ?o } WHERE {\n    ?s ?p ?o .\n    FILTER (?s = osmway:7 || ?s = osm2rdf:way_7)\n}\n"
/// ));
/// ```
#[must_use]
pub fn delete_update(subjects: &ObjectSubjects) -> String {
    format!(
        "{PREFIXES}DELETE {{ ?s ?p ?o }} WHERE {{\n    ?s ?p ?o .\n    FILTER (?s = {} || ?s = {})\n}}\n",
        subjects.primary, subjects.geometry
    )
}

/// Render the update adding `triples`.
#[must_use]
pub fn insert_update(triples: &Triples) -> String {
    format!("{PREFIXES}INSERT DATA {{\n{}\n}}\n", triples.as_str().trim_end())
}

/// Error raised while connecting to the update endpoint.
#[derive(Debug, Error)]
pub enum SparqlConnectError {
    /// The HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] ClientBuildError),
    /// The endpoint rejected the connectivity probe.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Settings for [`SparqlUpdateEmitter`].
#[derive(Debug, Clone)]
pub struct SparqlConfig {
    /// SPARQL Update endpoint.
    pub endpoint: String,
    /// Basic-auth credentials, when the endpoint requires them.
    pub credentials: Option<Credentials>,
    /// Transport settings.
    pub http: HttpClientConfig,
}

impl SparqlConfig {
    /// Configuration for an unauthenticated endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: None,
            http: HttpClientConfig::default(),
        }
    }

    /// Authenticate with HTTP basic auth.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Replace the transport settings.
    #[must_use]
    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }
}

/// [`UpdateEmitter`] speaking SPARQL 1.1 Update over HTTP.
#[derive(Debug)]
pub struct SparqlUpdateEmitter {
    endpoint: String,
    credentials: Option<Credentials>,
    client: BlockingClient,
}

impl SparqlUpdateEmitter {
    /// Build an emitter without contacting the endpoint.
    ///
    /// # Errors
    /// Returns [`ClientBuildError`] when the endpoint is not an absolute URL
    /// or the HTTP client cannot be built.
    pub fn new(config: SparqlConfig) -> Result<Self, ClientBuildError> {
        let endpoint = config.endpoint.trim().to_owned();
        url::Url::parse(&endpoint).map_err(|source| ClientBuildError::InvalidUrl {
            url: endpoint.clone(),
            source,
        })?;
        Ok(Self {
            endpoint,
            credentials: config.credentials,
            client: BlockingClient::new(&config.http)?,
        })
    }

    /// Build an emitter and verify the endpoint accepts updates.
    ///
    /// # Errors
    /// Returns [`SparqlConnectError::Store`] wrapping
    /// [`StoreError::Unavailable`] when the probe fails.
    pub fn connect(config: SparqlConfig) -> Result<Self, SparqlConnectError> {
        let emitter = Self::new(config)?;
        emitter.probe()?;
        Ok(emitter)
    }

    /// Send a prologue-only update.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] when the endpoint rejects it.
    pub fn probe(&self) -> Result<(), StoreError> {
        self.client
            .post(
                &self.endpoint,
                SPARQL_UPDATE_CONTENT_TYPE,
                PREFIXES.to_owned(),
                self.credentials.as_ref(),
            )
            .map_err(|source| StoreError::Unavailable { source })
    }

    /// Endpoint receiving updates.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&self, update: String) -> Result<(), StoreError> {
        self.client
            .post(
                &self.endpoint,
                SPARQL_UPDATE_CONTENT_TYPE,
                update,
                self.credentials.as_ref(),
            )
            .map_err(|source| StoreError::Request { source })
    }
}

impl UpdateEmitter for SparqlUpdateEmitter {
    fn delete(&self, subjects: &ObjectSubjects) -> Result<(), StoreError> {
        self.send(delete_update(subjects))
    }

    fn insert(&self, triples: &Triples) -> Result<(), StoreError> {
        self.send(insert_update(triples))
    }
}
