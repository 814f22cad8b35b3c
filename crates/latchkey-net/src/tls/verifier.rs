//! Certificate verifier that routes every handshake through a [`TrustPolicy`].

use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};

use super::challenge::{TrustDecision, TrustPolicy};
use super::trust::{ProtectionSpace, ServerTrust, TrustEvaluator};

/// Raises a challenge for each presented server certificate and acts on
/// the resulting [`TrustDecision`].
pub(crate) struct ChallengeVerifier {
    policy: TrustPolicy,
    evaluator: Arc<dyn TrustEvaluator>,
    default_verifier: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
}

impl ChallengeVerifier {
    pub(crate) fn new(
        policy: TrustPolicy,
        evaluator: Arc<dyn TrustEvaluator>,
        default_verifier: Arc<WebPkiServerVerifier>,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        Self {
            policy,
            evaluator,
            default_verifier,
            provider,
        }
    }
}

impl std::fmt::Debug for ChallengeVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeVerifier")
            .field("policy", &self.policy)
            .finish()
    }
}

/// The host part of a server name.
pub(crate) fn host_of(server_name: &ServerName<'_>) -> String {
    match server_name {
        ServerName::DnsName(name) => name.as_ref().to_string(),
        ServerName::IpAddress(ip) => std::net::IpAddr::from(*ip).to_string(),
        other => format!("{other:?}"),
    }
}

impl ServerCertVerifier for ChallengeVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let host = host_of(server_name);
        let trust = ServerTrust::new(
            server_name.to_owned(),
            end_entity.clone().into_owned(),
            intermediates.iter().map(|c| c.clone().into_owned()).collect(),
        )
        .at_time(now);
        let space = ProtectionSpace::new(host.clone(), Some(trust));

        let decision = self.policy.decide(&space, self.evaluator.as_ref());
        tracing::debug!(target: "latchkey_net::tls", "TLS challenge for '{}': {}", host, decision.label());

        match decision {
            TrustDecision::UseCredential(_) => Ok(ServerCertVerified::assertion()),
            TrustDecision::PerformDefaultHandling => self.default_verifier.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ),
            TrustDecision::RejectProtectionSpace => Err(rustls::Error::General(format!(
                "host '{host}' is not the pinned host domain"
            ))),
            TrustDecision::CancelAuthenticationChallenge => Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            )),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::IpAddr;

    #[test]
    fn test_host_of() {
        let dns = ServerName::try_from("example.com").unwrap();
        assert_eq!(host_of(&dns), "example.com");

        let ip = ServerName::IpAddress(IpAddr::from(std::net::IpAddr::from([127, 0, 0, 1])));
        assert_eq!(host_of(&ip), "127.0.0.1");
    }
}
