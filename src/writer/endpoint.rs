//! Writer endpoint descriptor.
//!
//! The configured writer URL is validated once at startup and reduced to its
//! origin (`scheme://host[:port]`). Paths, queries and fragments in the
//! configured value are discarded; every forwarded request supplies its own.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Why a writer URL was rejected.
#[derive(Debug, Error)]
pub enum WriterUrlError {
    #[error("malformed URL {url:?}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme {0:?} (expected http)")]
    Scheme(String),
    #[error("URL {0:?} has no host")]
    MissingHost(String),
    #[error("URL {0:?} must not carry credentials")]
    Credentials(String),
}

/// Validated, origin-only form of the writer node URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterEndpoint {
    origin: String,
}

impl WriterEndpoint {
    /// Validate and normalize a writer URL.
    pub fn parse(raw: &str) -> Result<Self, WriterUrlError> {
        let url = Url::parse(raw.trim()).map_err(|source| WriterUrlError::Malformed {
            url: raw.to_string(),
            source,
        })?;

        // The forwarding client speaks plain HTTP on the internal network.
        if url.scheme() != "http" {
            return Err(WriterUrlError::Scheme(url.scheme().to_string()));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(WriterUrlError::MissingHost(raw.to_string()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(WriterUrlError::Credentials(raw.to_string()));
        }

        Ok(Self {
            origin: url.origin().ascii_serialization(),
        })
    }

    /// The normalized origin, without a trailing slash.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Absolute URL for a path-and-query on the writer.
    pub fn url_for(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{}", self.origin, path_and_query)
        } else {
            format!("{}/{}", self.origin, path_and_query)
        }
    }
}

impl fmt::Display for WriterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin)
    }
}
