//! Client configuration and its builder.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use super::client::{CompletionHandler, HttpClient};
use crate::encoding::TextEncoding;

/// `Content-Type` for JSON bodies (the default).
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// `Content-Type` for URL-encoded form bodies.
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// How the server certificate is checked when no trust-all override is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateMode {
    /// Default trust evaluation.
    #[default]
    None,
    /// Trust is anchored to the configured certificate.
    PublicKey,
}

/// Request parameters, keyed by name.
///
/// Values are captured as JSON when inserted. A value whose `Serialize`
/// implementation cannot be expressed as JSON is remembered by key and
/// reported when the body is encoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: Map<String, Value>,
    rejected: Vec<(String, String)>,
}

impl Parameters {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value for `key`.
    pub fn insert<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) -> &mut Self {
        let key = key.into();
        self.rejected.retain(|(k, _)| *k != key);
        match serde_json::to_value(value) {
            Ok(value) => {
                self.values.insert(key, value);
            }
            Err(e) => {
                tracing::warn!(target: "latchkey_net::http", "Parameter '{}' is not representable as JSON: {}", key, e);
                self.values.remove(&key);
                self.rejected.push((key, e.to_string()));
            }
        }
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<T: Serialize + ?Sized>(mut self, key: impl Into<String>, value: &T) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a parameter value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Number of parameters, counting rejected ones.
    pub fn len(&self) -> usize {
        self.values.len() + self.rejected.len()
    }

    /// Whether no parameter was ever supplied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the representable parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The representable parameters as a JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Keys whose values could not be captured, with the reason.
    pub(crate) fn rejected(&self) -> &[(String, String)] {
        &self.rejected
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            rejected: Vec::new(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect::<Map<String, Value>>(),
        )
    }
}

/// Everything needed to perform one request.
///
/// Produced by [`HttpClientBuilder`] and never modified afterwards.
#[derive(Clone)]
pub struct ClientConfig {
    /// Target URL. Required at send time.
    pub url: Option<String>,
    /// Content type used to pick the body encoding.
    pub content_type: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Text encoding for form bodies and basic credentials.
    pub encoding: TextEncoding,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Body parameters for POST and PUT.
    pub parameters: Parameters,
    /// Basic authorization username.
    pub username: Option<String>,
    /// Basic authorization password.
    pub password: Option<String>,
    /// Pinned certificate (DER or PEM), or a PKCS#12 container when a
    /// certificate password is set.
    pub certificate: Option<Bytes>,
    /// Password for the PKCS#12 container.
    pub certificate_password: Option<String>,
    /// Accept any server certificate.
    pub trust_all_tls: bool,
    /// Only accept TLS challenges from this host (case-insensitive).
    pub pinned_host_domain: Option<String>,
    /// Refuse plain `http://` URLs.
    pub https_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            content_type: CONTENT_TYPE_JSON.to_string(),
            timeout: Duration::from_secs(60),
            encoding: TextEncoding::Utf8,
            headers: HashMap::new(),
            parameters: Parameters::new(),
            username: None,
            password: None,
            certificate: None,
            certificate_password: None,
            trust_all_tls: false,
            pinned_host_domain: None,
            https_only: false,
        }
    }
}

impl ClientConfig {
    /// The certificate mode implied by the configuration.
    pub fn certificate_mode(&self) -> CertificateMode {
        if self.certificate.is_some() {
            CertificateMode::PublicKey
        } else {
            CertificateMode::None
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("content_type", &self.content_type)
            .field("timeout", &self.timeout)
            .field("encoding", &self.encoding)
            .field("headers", &self.headers)
            .field("parameters", &self.parameters.len())
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .field("certificate_mode", &self.certificate_mode())
            .field("trust_all_tls", &self.trust_all_tls)
            .field("pinned_host_domain", &self.pinned_host_domain)
            .field("https_only", &self.https_only)
            .finish()
    }
}

/// Builder for a single-use [`HttpClient`].
#[derive(Default)]
pub struct HttpClientBuilder {
    config: ClientConfig,
    completion: Option<CompletionHandler>,
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a configuration closure over the builder.
    pub fn apply(self, configure: impl FnOnce(Self) -> Self) -> Self {
        configure(self)
    }

    /// Set the target URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    /// Set the content type that selects the body encoding.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.config.content_type = content_type.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the text encoding.
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Add multiple headers.
    pub fn headers(
        mut self,
        headers: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.config
            .headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replace all parameters.
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.config.parameters = parameters;
        self
    }

    /// Add one parameter.
    pub fn parameter<T: Serialize + ?Sized>(mut self, key: impl Into<String>, value: &T) -> Self {
        self.config.parameters.insert(key, value);
        self
    }

    /// Accept any server certificate.
    ///
    /// # Warning
    ///
    /// This disables certificate verification and makes the connection
    /// vulnerable to man-in-the-middle attacks.
    pub fn trust_all_tls(mut self, trust_all: bool) -> Self {
        self.config.trust_all_tls = trust_all;
        self
    }

    /// Only answer TLS challenges for this host.
    pub fn pinned_host_domain(mut self, host: impl Into<String>) -> Self {
        self.config.pinned_host_domain = Some(host.into());
        self
    }

    /// Refuse plain `http://` URLs.
    pub fn https_only(mut self, https_only: bool) -> Self {
        self.config.https_only = https_only;
        self
    }

    /// Set basic authorization credentials.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    /// Pin a certificate, or supply a PKCS#12 client identity together with
    /// its password.
    pub fn certificate(
        mut self,
        certificate: impl Into<Bytes>,
        password: Option<impl Into<String>>,
    ) -> Self {
        self.config.certificate = Some(certificate.into());
        self.config.certificate_password = password.map(Into::into);
        self
    }

    /// Set the completion callback. It runs once, with the result of the send.
    pub fn on_completion(
        mut self,
        handler: impl FnOnce(crate::Result<Bytes>) + Send + 'static,
    ) -> Self {
        if self.completion.is_some() {
            tracing::debug!(target: "latchkey_net::http", "Replacing previously set completion callback");
        }
        self.completion = Some(Box::new(handler));
        self
    }

    /// Get the configuration accumulated so far.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the client.
    pub fn build(self) -> HttpClient {
        HttpClient::from_parts(self.config, self.completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.content_type, "application/json");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.encoding, TextEncoding::Utf8);
        assert!(config.url.is_none());
        assert!(!config.trust_all_tls);
        assert_eq!(config.certificate_mode(), CertificateMode::None);
    }

    #[test]
    fn test_certificate_sets_public_key_mode() {
        let builder = HttpClientBuilder::new().certificate(vec![1u8, 2, 3], None::<String>);
        assert_eq!(builder.config().certificate_mode(), CertificateMode::PublicKey);
        assert!(builder.config().certificate_password.is_none());
    }

    #[test]
    fn test_apply_closure() {
        let builder = HttpClientBuilder::new().apply(|b| {
            b.url("https://example.com")
                .header("Accept", "application/json")
                .basic_auth("alice", "wonder")
        });
        let config = builder.config();
        assert_eq!(config.url.as_deref(), Some("https://example.com"));
        assert_eq!(config.headers.get("Accept").map(String::as_str), Some("application/json"));
        assert_eq!(config.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_parameters_capture_json() {
        let params = Parameters::new()
            .with("name", "John")
            .with("age", &42)
            .with("tags", &["a", "b"]);
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("age"), Some(&Value::from(42)));
        assert!(params.rejected().is_empty());
    }

    #[test]
    fn test_parameters_reject_non_json() {
        let mut bad = StdMap::new();
        bad.insert((1, 2), "tuple keys are not JSON");

        let mut params = Parameters::new();
        params.insert("bad", &bad);
        assert!(!params.is_empty());
        assert_eq!(params.rejected().len(), 1);
        assert!(params.get("bad").is_none());

        // A later valid value for the same key clears the rejection.
        params.insert("bad", "fine");
        assert!(params.rejected().is_empty());
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_debug_hides_password() {
        let builder = HttpClientBuilder::new().basic_auth("alice", "wonder");
        let debug = format!("{:?}", builder.config());
        assert!(!debug.contains("wonder"));
        assert!(debug.contains("alice"));
    }
}
