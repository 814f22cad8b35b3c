//! HTTP client with basic authentication and TLS certificate pinning.
//!
//! This crate sends single GET, POST, PUT and DELETE requests and reports
//! each outcome exactly once:
//!
//! - **Bodies**: parameters are sent as JSON or as a form body
//! - **Basic auth**: `Authorization` header from a username and password
//! - **Pinning**: trust anchored to a DER/PEM certificate or a PKCS#12
//!   identity, optionally restricted to one host
//! - **Client certificates**: the PKCS#12 identity is presented for mutual TLS
//!
//! # Example
//!
//! ```ignore
//! use latchkey_net::{HttpClient, NetworkError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = HttpClient::builder()
//!         .url("https://api.example.com/users")
//!         .basic_auth("alice", "wonder")
//!         .parameter("name", "John")
//!         .build()
//!         .post()
//!         .await
//!         .expect("request task panicked");
//!
//!     match result {
//!         Ok(body) => println!("{}", String::from_utf8_lossy(&body)),
//!         Err(NetworkError::HttpStatus { status, body }) => {
//!             eprintln!("server said {status}: {}", String::from_utf8_lossy(&body));
//!         }
//!         Err(err) => eprintln!("{err}"),
//!     }
//! }
//! ```
//!
//! # Pinning a certificate
//!
//! ```ignore
//! let pkcs12 = std::fs::read("client.p12")?;
//! let client = HttpClient::builder()
//!     .url("https://internal.example.com/api")
//!     .certificate(pkcs12, Some("secret"))
//!     .pinned_host_domain("internal.example.com")
//!     .build();
//! ```
//!
//! See [`tls`] for how each handshake is decided.

pub mod auth;
pub mod encoding;
mod error;
pub mod http;
pub mod runtime;
pub mod tls;

pub use encoding::TextEncoding;
pub use error::{APP_TRANSPORT_SECURITY_VIOLATION, NetworkError, Result, TransportFailure};

// Re-export commonly used types at the crate root
pub use http::{
    CertificateMode, ClientConfig, HttpClient, HttpClientBuilder, HttpMethod, Parameters,
};
