//! Error types for the networking module.

use bytes::Bytes;
use thiserror::Error;

use crate::encoding::TextEncoding;
use crate::http::HttpMethod;

/// Status reported by the transport when the transport-security policy
/// refuses to load a resource.
pub const APP_TRANSPORT_SECURITY_VIOLATION: i32 = -1022;

/// Broad category of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The connection (including the TLS handshake) could not be established.
    Connect,
    /// The response body could not be read.
    Body,
    /// Any other failure while issuing the request.
    Request,
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connect"),
            Self::Body => write!(f, "body"),
            Self::Request => write!(f, "request"),
        }
    }
}

/// Network-specific errors.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    /// No URL was configured.
    #[error("URL cannot be empty")]
    MissingUrl,
    /// The configured URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Basic authorization was requested without a username or password.
    #[error("Missing credential: {0}")]
    MissingCredential(String),
    /// A write request was issued without any parameters.
    #[error("Cannot send {method} request without parameters")]
    EmptyParameters {
        /// The method that required a body.
        method: HttpMethod,
    },
    /// The parameters could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A string could not be represented in the configured text encoding.
    #[error("Text cannot be encoded as {encoding}")]
    Encoding {
        /// The encoding that rejected the text.
        encoding: TextEncoding,
    },
    /// The underlying transport failed.
    #[error("Transport error ({kind}): {message}")]
    Transport {
        /// Category of the failure.
        kind: TransportFailure,
        /// Description from the transport.
        message: String,
    },
    /// The transport-security policy refused the request.
    #[error("Request blocked by transport security policy")]
    SecurityTransport,
    /// The server answered with a status other than 200.
    #[error("HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: Bytes,
    },
    /// A PKCS#12 container could not be opened.
    #[error("Invalid certificate or password: {0}")]
    CertificateParse(String),
    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportFailure::Timeout
        } else if err.is_connect() {
            TransportFailure::Connect
        } else if err.is_body() || err.is_decode() {
            TransportFailure::Body
        } else {
            TransportFailure::Request
        };
        Self::Transport {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rustls::Error> for NetworkError {
    fn from(err: rustls::Error) -> Self {
        Self::Tls(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
