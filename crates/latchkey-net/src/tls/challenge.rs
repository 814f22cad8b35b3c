//! TLS authentication challenge handling.

use std::io::{BufReader, Cursor};

use rustls::pki_types::CertificateDer;

use super::trust::{ProtectionSpace, ServerTrust, TrustEvaluator};
use crate::auth::{ClientCredential, load_client_credential};
use crate::http::{CertificateMode, ClientConfig};

/// Credential handed back for a challenge.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Accept the server trust as presented.
    ServerTrust(ServerTrust),
    /// Present a client identity.
    ClientIdentity(ClientCredential),
}

/// How a TLS challenge is resolved.
#[derive(Debug, Clone)]
pub enum TrustDecision {
    /// Continue the handshake with this credential.
    UseCredential(Credential),
    /// The challenge is for a host we do not talk to.
    RejectProtectionSpace,
    /// Fall back to default certificate verification.
    PerformDefaultHandling,
    /// Abort the handshake.
    CancelAuthenticationChallenge,
}

impl TrustDecision {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UseCredential(Credential::ServerTrust(_)) => "use server trust",
            Self::UseCredential(Credential::ClientIdentity(_)) => "use client identity",
            Self::RejectProtectionSpace => "reject protection space",
            Self::PerformDefaultHandling => "default handling",
            Self::CancelAuthenticationChallenge => "cancel",
        }
    }
}

/// The trust settings of one client, resolved once before sending.
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    /// Accept any server certificate.
    pub trust_all: bool,
    /// Only answer challenges for this host.
    pub pinned_host_domain: Option<String>,
    /// Whether trust is anchored to a configured certificate.
    pub certificate_mode: CertificateMode,
    /// The anchors for [`CertificateMode::PublicKey`].
    pub pinned_certificates: Vec<CertificateDer<'static>>,
    /// Whether a certificate password was configured.
    pub has_certificate_password: bool,
    /// Identity loaded from the configured PKCS#12 container.
    pub client_credential: Option<ClientCredential>,
}

impl TrustPolicy {
    /// Resolve the policy for `config`, loading any client credential.
    ///
    /// With a certificate password the certificate bytes are a PKCS#12
    /// container and its whole chain is pinned, so a server issued by a CA in
    /// the container is accepted. Otherwise they are a PEM or DER certificate.
    pub fn from_config(config: &ClientConfig) -> Self {
        let client_credential = load_client_credential(
            config.certificate.as_deref(),
            config.certificate_password.as_deref(),
        );

        let pinned_certificates = match (&client_credential, &config.certificate) {
            (Some(credential), _) => credential.cert_chain().to_vec(),
            (None, Some(bytes)) => vec![parse_certificate(bytes)],
            (None, None) => Vec::new(),
        };

        Self {
            trust_all: config.trust_all_tls,
            pinned_host_domain: config.pinned_host_domain.clone(),
            certificate_mode: config.certificate_mode(),
            pinned_certificates,
            has_certificate_password: config.certificate_password.is_some(),
            client_credential,
        }
    }

    /// The identity to present if the server asks for a client certificate.
    pub fn presented_identity(&self) -> Option<&ClientCredential> {
        if self.trust_all || self.certificate_mode != CertificateMode::PublicKey {
            return None;
        }
        self.client_credential.as_ref()
    }

    /// Resolve a challenge for `space`.
    pub fn decide(&self, space: &ProtectionSpace, evaluator: &dyn TrustEvaluator) -> TrustDecision {
        if let Some(domain) = &self.pinned_host_domain {
            if !domain.eq_ignore_ascii_case(space.host()) {
                return TrustDecision::RejectProtectionSpace;
            }
        }

        if self.trust_all {
            return server_trust_or_default(space);
        }

        if self.certificate_mode == CertificateMode::PublicKey {
            if !evaluator.evaluate(space, &self.pinned_certificates) {
                return TrustDecision::CancelAuthenticationChallenge;
            }
            if self.has_certificate_password {
                if let Some(credential) = &self.client_credential {
                    return TrustDecision::UseCredential(Credential::ClientIdentity(
                        credential.clone(),
                    ));
                }
            }
            return server_trust_or_default(space);
        }

        TrustDecision::PerformDefaultHandling
    }
}

fn server_trust_or_default(space: &ProtectionSpace) -> TrustDecision {
    match space.server_trust() {
        Some(trust) => TrustDecision::UseCredential(Credential::ServerTrust(trust.clone())),
        None => TrustDecision::PerformDefaultHandling,
    }
}

/// Read the first PEM certificate in `bytes`, or take them as DER.
fn parse_certificate(bytes: &[u8]) -> CertificateDer<'static> {
    let mut reader = BufReader::new(Cursor::new(bytes));
    match rustls_pemfile::certs(&mut reader).next() {
        Some(Ok(cert)) => cert,
        _ => CertificateDer::from(bytes.to_vec()),
    }
}
