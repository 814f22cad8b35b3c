//! HTTP client and request executor.

use std::sync::Arc;

use bytes::Bytes;

use super::config::{ClientConfig, HttpClientBuilder};
use super::request::{HttpMethod, PreparedRequest, prepare};
use crate::error::{APP_TRANSPORT_SECURITY_VIOLATION, NetworkError, Result};
use crate::runtime;
use crate::tls::{self, PinnedCertificateEvaluator, TrustEvaluator, TrustPolicy};

/// Callback receiving the result of a send.
pub type CompletionHandler = Box<dyn FnOnce(Result<Bytes>) + Send + 'static>;

/// A single-use HTTP client.
///
/// Each verb method consumes the client, so one configuration drives
/// exactly one request and the completion callback runs at most once.
///
/// # Example
///
/// ```ignore
/// use latchkey_net::HttpClient;
///
/// let handle = HttpClient::builder()
///     .url("https://api.example.com/users")
///     .basic_auth("alice", "wonder")
///     .parameter("name", "John")
///     .on_completion(|result| match result {
///         Ok(body) => println!("{} bytes", body.len()),
///         Err(err) => eprintln!("{err}"),
///     })
///     .build()
///     .post();
/// ```
pub struct HttpClient {
    config: ClientConfig,
    completion: Option<CompletionHandler>,
    evaluator: Arc<dyn TrustEvaluator>,
}

impl HttpClient {
    pub(crate) fn from_parts(config: ClientConfig, completion: Option<CompletionHandler>) -> Self {
        Self {
            config,
            completion,
            evaluator: Arc::new(PinnedCertificateEvaluator),
        }
    }

    /// Create a builder for configuring a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Get the client's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the evaluator consulted for pinned certificates.
    pub fn with_trust_evaluator(mut self, evaluator: Arc<dyn TrustEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Start a GET request.
    pub fn get(self) -> tokio::task::JoinHandle<Result<Bytes>> {
        self.spawn(HttpMethod::Get)
    }

    /// Start a DELETE request.
    pub fn delete(self) -> tokio::task::JoinHandle<Result<Bytes>> {
        self.spawn(HttpMethod::Delete)
    }

    /// Start a POST request.
    pub fn post(self) -> tokio::task::JoinHandle<Result<Bytes>> {
        self.spawn(HttpMethod::Post)
    }

    /// Start an update (PUT) request.
    pub fn update(self) -> tokio::task::JoinHandle<Result<Bytes>> {
        self.spawn(HttpMethod::Update)
    }

    /// Start a request on the async runtime.
    ///
    /// Returns immediately. The completion callback receives the result, and
    /// so does the returned handle.
    pub fn spawn(self, method: HttpMethod) -> tokio::task::JoinHandle<Result<Bytes>> {
        runtime::spawn(self.execute(method))
    }

    /// Perform the request in the current async context.
    pub async fn execute(self, method: HttpMethod) -> Result<Bytes> {
        let Self {
            config,
            completion,
            evaluator,
        } = self;

        let result = send_with_evaluator(method, config, evaluator).await;
        if let Some(handler) = completion {
            handler(result.clone());
        }
        result
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}

/// Send one request described by `config`.
pub async fn send(method: HttpMethod, config: ClientConfig) -> Result<Bytes> {
    send_with_evaluator(method, config, Arc::new(PinnedCertificateEvaluator)).await
}

/// Like [`send`], consulting `evaluator` for pinned certificates.
pub async fn send_with_evaluator(
    method: HttpMethod,
    config: ClientConfig,
    evaluator: Arc<dyn TrustEvaluator>,
) -> Result<Bytes> {
    let request = prepare(method, &config)?;

    if config.https_only && request.url.scheme() != "https" {
        tracing::warn!(target: "latchkey_net::http", "Refusing insecure URL {}", request.url);
        return classify(TransportOutcome::status(APP_TRANSPORT_SECURITY_VIOLATION));
    }

    let transport = build_transport(&config, evaluator)?;

    tracing::debug!(target: "latchkey_net::http", "{} {}", request.method, request.url);
    let outcome = dispatch(&transport, request).await;
    classify(outcome)
}

fn build_transport(config: &ClientConfig, evaluator: Arc<dyn TrustEvaluator>) -> Result<reqwest::Client> {
    let tls = tls::build_client_config(TrustPolicy::from_config(config), evaluator).inspect_err(|e| {
        tracing::error!(target: "latchkey_net::tls", "TLS session unavailable: {}", e);
    })?;

    reqwest::Client::builder()
        .timeout(config.timeout)
        .use_preconfigured_tls(tls)
        .build()
        .map_err(|e| NetworkError::Tls(format!("Failed to create transport: {}", e)))
}

async fn dispatch(client: &reqwest::Client, request: PreparedRequest) -> TransportOutcome {
    let mut builder = client
        .request(request.method.to_reqwest(), request.url)
        .headers(request.headers);
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => return TransportOutcome::failed(e.into()),
    };

    let status = i32::from(response.status().as_u16());
    match response.bytes().await {
        Ok(body) => TransportOutcome {
            error: None,
            status: Some(status),
            body: Some(body),
        },
        Err(e) => TransportOutcome {
            error: Some(e.into()),
            status: Some(status),
            body: None,
        },
    }
}

/// What the transport reported for one request.
#[derive(Debug, Clone, Default)]
pub struct TransportOutcome {
    /// Transport-level failure.
    pub error: Option<NetworkError>,
    /// HTTP status, or [`APP_TRANSPORT_SECURITY_VIOLATION`].
    pub status: Option<i32>,
    /// Response body.
    pub body: Option<Bytes>,
}

impl TransportOutcome {
    /// An outcome carrying only a transport failure.
    pub fn failed(error: NetworkError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// An outcome carrying only a status.
    pub fn status(status: i32) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Reduce a transport outcome to one result.
///
/// Precedence: transport error, then the transport-security status, then any
/// status other than 200, then the body.
pub fn classify(outcome: TransportOutcome) -> Result<Bytes> {
    if let Some(err) = outcome.error {
        tracing::error!(target: "latchkey_net::http", "Http error: {}", err);
        return Err(err);
    }

    match outcome.status {
        Some(APP_TRANSPORT_SECURITY_VIOLATION) => Err(NetworkError::SecurityTransport),
        Some(200) | None => Ok(outcome.body.unwrap_or_default()),
        Some(status) => Err(NetworkError::HttpStatus {
            status: u16::try_from(status).unwrap_or_default(),
            body: outcome.body.unwrap_or_default(),
        }),
    }
}
