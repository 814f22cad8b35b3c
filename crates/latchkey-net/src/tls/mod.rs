//! TLS trust handling for outgoing requests.
//!
//! Every handshake raises a challenge that a [`TrustPolicy`] resolves into a
//! [`TrustDecision`]:
//!
//! 1. A pinned host domain that does not match the challenged host rejects
//!    the handshake.
//! 2. Trust-all accepts the presented server trust.
//! 3. With a pinned certificate, a [`TrustEvaluator`] decides; the client
//!    identity is presented when one was loaded.
//! 4. Otherwise the bundled web roots decide.
//!
//! # Pinning
//!
//! ```ignore
//! use latchkey_net::HttpClient;
//!
//! let client = HttpClient::builder()
//!     .url("https://api.example.com/items")
//!     .certificate(std::fs::read("server.der")?, None::<String>)
//!     .pinned_host_domain("api.example.com")
//!     .build();
//! ```

mod challenge;
mod trust;
mod verifier;

use std::sync::Arc;

use rustls::RootCertStore;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;

pub use challenge::{Credential, TrustDecision, TrustPolicy};
pub use trust::{
    PinnedCertificateEvaluator, ProtectionSpace, ServerTrust, TrustEvaluator, TrustExceptions,
    TrustFailure, TrustResult, evaluate,
};

use crate::error::{NetworkError, Result};
use verifier::ChallengeVerifier;

/// The crypto provider used for all TLS work in this crate.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a rustls client configuration whose certificate checks go through
/// `policy` and `evaluator`.
pub fn build_client_config(
    policy: TrustPolicy,
    evaluator: Arc<dyn TrustEvaluator>,
) -> Result<rustls::ClientConfig> {
    let provider = crypto_provider();

    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let default_verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(root_store), provider.clone())
        .build()
        .map_err(|e| NetworkError::Tls(format!("Failed to build default verifier: {}", e)))?;

    let identity = policy.presented_identity().cloned();
    let verifier = ChallengeVerifier::new(policy, evaluator, default_verifier, provider.clone());

    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier));

    let mut config = if let Some(identity) = identity {
        builder
            .with_client_auth_cert(identity.cert_chain().to_vec(), identity.private_key().clone_key())
            .map_err(|e| NetworkError::Tls(format!("Invalid client certificate: {}", e)))?
    } else {
        builder.with_no_client_auth()
    };

    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_default_config() {
        let config = build_client_config(TrustPolicy::default(), Arc::new(PinnedCertificateEvaluator));
        assert!(config.is_ok());
    }

    #[test]
    fn test_build_trust_all_config() {
        let policy = TrustPolicy {
            trust_all: true,
            ..TrustPolicy::default()
        };
        let config = build_client_config(policy, Arc::new(PinnedCertificateEvaluator)).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }
}
