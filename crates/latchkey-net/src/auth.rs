//! Basic authorization and client certificate credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::encoding::TextEncoding;
use crate::error::{NetworkError, Result};

/// Build a `Basic` authorization header value.
///
/// Both parts must be present and non-empty. The `username:password` pair is
/// converted to bytes with `encoding` before base64 encoding.
pub fn basic_auth_header(
    username: Option<&str>,
    password: Option<&str>,
    encoding: TextEncoding,
) -> Result<String> {
    let username = username.filter(|u| !u.is_empty()).ok_or_else(|| {
        NetworkError::MissingCredential("username not set for basic authorization".to_string())
    })?;
    let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
        NetworkError::MissingCredential("password not set for basic authorization".to_string())
    })?;

    let credentials = encoding.encode_bytes(&format!("{username}:{password}"))?;
    Ok(format!("Basic {}", STANDARD.encode(credentials)))
}

/// A client identity for mutual TLS, loaded from a PKCS#12 container.
///
/// Holds the private key and its certificate chain, leaf first.
pub struct ClientCredential {
    cert_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
}

impl Clone for ClientCredential {
    fn clone(&self) -> Self {
        Self {
            cert_chain: self.cert_chain.clone(),
            private_key: self.private_key.clone_key(),
        }
    }
}

impl std::fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredential")
            .field("cert_count", &self.cert_chain.len())
            .field("has_key", &true)
            .finish()
    }
}

impl ClientCredential {
    /// Open a PKCS#12 container with `password`.
    pub fn from_pkcs12(der: &[u8], password: &str) -> Result<Self> {
        let keystore = p12_keystore::KeyStore::from_pkcs12(der, password)
            .map_err(|e| NetworkError::CertificateParse(e.to_string()))?;

        let (_, key_chain) = keystore.private_key_chain().ok_or_else(|| {
            NetworkError::CertificateParse("container holds no private key".to_string())
        })?;

        let cert_chain: Vec<CertificateDer<'static>> = key_chain
            .chain()
            .iter()
            .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
            .collect();

        if cert_chain.is_empty() {
            return Err(NetworkError::CertificateParse(
                "container holds no certificate for its private key".to_string(),
            ));
        }

        Ok(Self {
            cert_chain,
            private_key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_chain.key().to_vec())),
        })
    }

    /// The leaf certificate.
    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.cert_chain[0]
    }

    /// The certificate chain, leaf first.
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    /// The private key.
    pub(crate) fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.private_key
    }
}

/// Load the client credential from configured certificate bytes.
///
/// Returns `None` when either input is missing or the container cannot be
/// opened; parse failures are logged.
pub fn load_client_credential(
    certificate: Option<&[u8]>,
    password: Option<&str>,
) -> Option<ClientCredential> {
    let certificate = certificate?;
    let password = password?;

    match ClientCredential::from_pkcs12(certificate, password) {
        Ok(credential) => Some(credential),
        Err(err) => {
            tracing::warn!(target: "latchkey_net::auth", "Client certificate unavailable: {}", err);
            None
        }
    }
}
