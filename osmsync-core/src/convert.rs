//! Boundary to the external OSM-XML to RDF converter.

use std::io;

use thiserror::Error;

use crate::Triples;

/// Errors raised while converting an osmChange payload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConversionError {
    /// Staging input or output could not be prepared.
    #[error("failed to stage converter files at {path}: {source}")]
    Staging {
        /// Path being prepared.
        path: String,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// The converter process could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// Program that failed to start.
        program: String,
        /// Spawn error.
        #[source]
        source: io::Error,
    },
    /// The converter ran but reported failure.
    #[error("converter exited unsuccessfully ({})", exit_description(*.code))]
    Exit {
        /// Exit status, absent when the process was killed by a signal.
        code: Option<i32>,
    },
    /// The converter output could not be read or decompressed.
    #[error("failed to read converter output {path}: {source}")]
    Output {
        /// Output path.
        path: String,
        /// Read or decompression error.
        #[source]
        source: io::Error,
    },
}

fn exit_description(code: Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_owned(), |code| format!("status {code}"))
}

/// Converts an osmChange document into triples.
///
/// Implementations return the converter's output with prefix declarations
/// already removed. Callers serialise access; a converter need not be
/// reentrant.
pub trait Converter {
    /// Convert the osmChange document `payload`.
    ///
    /// # Errors
    /// Returns [`ConversionError`] when staging, execution or output decoding
    /// fails.
    fn convert(&self, payload: &str) -> Result<Triples, ConversionError>;
}

impl<T: Converter + ?Sized> Converter for &T {
    fn convert(&self, payload: &str) -> Result<Triples, ConversionError> {
        (**self).convert(payload)
    }
}
