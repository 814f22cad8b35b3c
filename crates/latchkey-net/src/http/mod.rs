//! HTTP requests with basic auth and certificate pinning.
//!
//! A request is described by a [`ClientConfig`], built through
//! [`HttpClientBuilder`], and sent by one of the verb methods on
//! [`HttpClient`]:
//!
//! ```ignore
//! use latchkey_net::http::{CONTENT_TYPE_FORM, HttpClient};
//!
//! let handle = HttpClient::builder()
//!     .url("https://api.example.com/login")
//!     .content_type(CONTENT_TYPE_FORM)
//!     .parameter("user", "alice")
//!     .parameter("remember", &true)
//!     .on_completion(|result| match result {
//!         Ok(body) => println!("logged in: {}", String::from_utf8_lossy(&body)),
//!         Err(err) => eprintln!("login failed: {err}"),
//!     })
//!     .build()
//!     .post();
//! ```
//!
//! # Outcomes
//!
//! Every send produces exactly one result:
//!
//! - a transport failure ([`NetworkError::Transport`])
//! - a transport-security refusal ([`NetworkError::SecurityTransport`])
//! - a status other than 200 with its body ([`NetworkError::HttpStatus`])
//! - otherwise the response body, possibly empty
//!
//! [`NetworkError::Transport`]: crate::NetworkError::Transport
//! [`NetworkError::SecurityTransport`]: crate::NetworkError::SecurityTransport
//! [`NetworkError::HttpStatus`]: crate::NetworkError::HttpStatus

mod body;
mod client;
mod config;
mod request;

pub use body::encode;
pub use client::{
    CompletionHandler, HttpClient, TransportOutcome, classify, send, send_with_evaluator,
};
pub use config::{
    CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, CertificateMode, ClientConfig, HttpClientBuilder,
    Parameters,
};
pub use request::{HttpMethod, PreparedRequest, prepare};
