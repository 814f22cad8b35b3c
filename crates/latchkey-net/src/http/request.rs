//! HTTP request methods and request preparation.

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use super::body;
use super::config::ClientConfig;
use crate::auth::basic_auth_header;
use crate::error::{NetworkError, Result};

/// HTTP request methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method.
    Get,
    /// HTTP DELETE method.
    Delete,
    /// HTTP POST method.
    Post,
    /// Update, sent as HTTP PUT.
    Update,
}

impl HttpMethod {
    /// Whether requests with this method carry a body.
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Update)
    }

    /// The method name on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Delete => "DELETE",
            Self::Post => "POST",
            Self::Update => "PUT",
        }
    }

    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Delete => reqwest::Method::DELETE,
            Self::Post => reqwest::Method::POST,
            Self::Update => reqwest::Method::PUT,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready for the transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The parsed request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Encoded body, for POST and PUT.
    pub body: Option<Bytes>,
}

/// Build the request for `method` from `config` without any network I/O.
///
/// Basic authorization is best effort: when it cannot be built the request
/// goes out without it. A body that cannot be encoded fails the request.
pub fn prepare(method: HttpMethod, config: &ClientConfig) -> Result<PreparedRequest> {
    let url = parse_url(config.url.as_deref())?;

    let mut headers = HeaderMap::new();

    if config.username.is_some() || config.password.is_some() {
        match basic_auth_header(
            config.username.as_deref(),
            config.password.as_deref(),
            config.encoding,
        ) {
            Ok(value) => {
                if let Ok(value) = HeaderValue::from_str(&value) {
                    headers.insert(AUTHORIZATION, value);
                }
            }
            Err(err) => {
                tracing::warn!(target: "latchkey_net::http", "Sending without basic authorization: {}", err);
            }
        }
    }

    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => {
                tracing::warn!(target: "latchkey_net::http", "Skipping invalid header '{}'", name);
            }
        }
    }

    let body = if method.has_body() {
        let body = body::encode(
            method,
            &config.parameters,
            &config.content_type,
            config.encoding,
        )?;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        if !headers.contains_key(CONTENT_TYPE) {
            match HeaderValue::from_str(&config.content_type) {
                Ok(value) => {
                    headers.insert(CONTENT_TYPE, value);
                }
                Err(_) => {
                    tracing::warn!(target: "latchkey_net::http", "Invalid content type '{}'", config.content_type);
                }
            }
        }
        Some(body)
    } else {
        None
    };

    Ok(PreparedRequest {
        method,
        url,
        headers,
        body,
    })
}

fn parse_url(raw: Option<&str>) -> Result<Url> {
    let raw = raw.ok_or(NetworkError::MissingUrl)?;
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(NetworkError::InvalidUrl(format!(
            "unsupported scheme '{scheme}'"
        ))),
    }
}
