//! Server trust evaluation against pinned anchors.

use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::ServerCertVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, RootCertStore};

use super::crypto_provider;

/// Why a certificate chain failed evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustFailure {
    /// A certificate in the chain has expired.
    Expired,
    /// A certificate in the chain is not valid yet.
    NotYetValid,
    /// The leaf is not valid for the host.
    NameMismatch,
    /// The chain does not lead to an anchor.
    UnknownIssuer,
    /// A signature in the chain does not verify.
    BadSignature,
    /// A certificate has been revoked.
    Revoked,
    /// A certificate could not be decoded.
    Malformed,
    /// No usable anchor was installed.
    NoAnchors,
    /// Any other failure.
    Other(String),
}

impl TrustFailure {
    /// Whether the failure can be overridden by trust exceptions.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Expired | Self::NotYetValid | Self::NameMismatch)
    }
}

impl std::fmt::Display for TrustFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "certificate expired"),
            Self::NotYetValid => write!(f, "certificate not yet valid"),
            Self::NameMismatch => write!(f, "certificate not valid for host"),
            Self::UnknownIssuer => write!(f, "unknown issuer"),
            Self::BadSignature => write!(f, "bad signature"),
            Self::Revoked => write!(f, "certificate revoked"),
            Self::Malformed => write!(f, "malformed certificate"),
            Self::NoAnchors => write!(f, "no anchor certificates"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<rustls::Error> for TrustFailure {
    fn from(err: rustls::Error) -> Self {
        match err {
            rustls::Error::InvalidCertificate(cert_err) => match cert_err {
                CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
                    Self::Expired
                }
                CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
                    Self::NotYetValid
                }
                CertificateError::NotValidForName
                | CertificateError::NotValidForNameContext { .. } => Self::NameMismatch,
                CertificateError::UnknownIssuer => Self::UnknownIssuer,
                CertificateError::BadSignature => Self::BadSignature,
                CertificateError::Revoked => Self::Revoked,
                CertificateError::BadEncoding => Self::Malformed,
                other => Self::Other(format!("{other:?}")),
            },
            other => Self::Other(other.to_string()),
        }
    }
}

/// Outcome of evaluating a [`ServerTrust`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustResult {
    /// The chain validated against the installed anchors.
    Unspecified,
    /// The chain is explicitly trusted (anchored leaf, or excepted failure).
    Proceed,
    /// Validation failed in a way trust exceptions may override.
    RecoverableTrustFailure(TrustFailure),
    /// Validation failed for good.
    FatalTrustFailure(TrustFailure),
}

impl TrustResult {
    /// Whether the result means the server is trusted.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Unspecified | Self::Proceed)
    }
}

/// Failures accepted for one specific leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustExceptions {
    leaf: CertificateDer<'static>,
    failures: Vec<TrustFailure>,
}

impl TrustExceptions {
    fn covers(&self, leaf: &CertificateDer<'_>, failure: &TrustFailure) -> bool {
        self.leaf.as_ref() == leaf.as_ref() && self.failures.contains(failure)
    }
}

/// The certificate chain a server presented, plus the anchors and
/// exceptions it is evaluated with.
#[derive(Debug, Clone)]
pub struct ServerTrust {
    server_name: ServerName<'static>,
    end_entity: CertificateDer<'static>,
    intermediates: Vec<CertificateDer<'static>>,
    anchors: Vec<CertificateDer<'static>>,
    exceptions: Option<TrustExceptions>,
    now: UnixTime,
}

impl ServerTrust {
    /// Create a trust object for a presented chain, evaluated at the current time.
    pub fn new(
        server_name: ServerName<'static>,
        end_entity: CertificateDer<'static>,
        intermediates: Vec<CertificateDer<'static>>,
    ) -> Self {
        Self {
            server_name,
            end_entity,
            intermediates,
            anchors: Vec::new(),
            exceptions: None,
            now: UnixTime::now(),
        }
    }

    /// Evaluate at a fixed point in time.
    pub fn at_time(mut self, now: UnixTime) -> Self {
        self.now = now;
        self
    }

    /// The server name the chain is checked against.
    pub fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }

    /// The presented leaf certificate.
    pub fn end_entity(&self) -> &CertificateDer<'static> {
        &self.end_entity
    }

    /// Replace the anchors with `anchors`.
    ///
    /// With no anchors installed the bundled web roots are used.
    pub fn set_anchor_certificates(&mut self, anchors: Vec<CertificateDer<'static>>) {
        self.anchors = anchors;
    }

    /// Evaluate the chain.
    pub fn evaluate(&self) -> TrustResult {
        if self
            .anchors
            .iter()
            .any(|anchor| anchor.as_ref() == self.end_entity.as_ref())
        {
            return TrustResult::Proceed;
        }

        let failure = match self.verify() {
            Ok(()) => return TrustResult::Unspecified,
            Err(failure) => failure,
        };

        if let Some(exceptions) = &self.exceptions {
            if exceptions.covers(&self.end_entity, &failure) {
                return TrustResult::Proceed;
            }
        }

        if failure.is_recoverable() {
            TrustResult::RecoverableTrustFailure(failure)
        } else {
            TrustResult::FatalTrustFailure(failure)
        }
    }

    /// Exceptions that would accept the failure of the current evaluation.
    ///
    /// `None` when the evaluation does not fail recoverably.
    pub fn copy_exceptions(&self) -> Option<TrustExceptions> {
        match self.evaluate() {
            TrustResult::RecoverableTrustFailure(failure) => Some(TrustExceptions {
                leaf: self.end_entity.clone(),
                failures: vec![failure],
            }),
            _ => None,
        }
    }

    /// Install exceptions for later evaluations.
    pub fn set_exceptions(&mut self, exceptions: Option<TrustExceptions>) {
        self.exceptions = exceptions;
    }

    fn verify(&self) -> Result<(), TrustFailure> {
        let mut roots = RootCertStore::empty();
        if self.anchors.is_empty() {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        } else {
            for anchor in &self.anchors {
                if let Err(e) = roots.add(anchor.clone()) {
                    tracing::debug!(target: "latchkey_net::tls", "Ignoring unusable anchor: {}", e);
                }
            }
        }
        if roots.is_empty() {
            return Err(TrustFailure::NoAnchors);
        }

        let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), crypto_provider())
            .build()
            .map_err(|e| TrustFailure::Other(e.to_string()))?;

        verifier
            .verify_server_cert(
                &self.end_entity,
                &self.intermediates,
                &self.server_name,
                &[],
                self.now,
            )
            .map(|_| ())
            .map_err(TrustFailure::from)
    }
}

/// The host and server trust a TLS challenge was raised for.
#[derive(Debug, Clone)]
pub struct ProtectionSpace {
    host: String,
    server_trust: Option<ServerTrust>,
}

impl ProtectionSpace {
    /// Create a protection space.
    pub fn new(host: impl Into<String>, server_trust: Option<ServerTrust>) -> Self {
        Self {
            host: host.into(),
            server_trust,
        }
    }

    /// The challenged host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The server trust, if the challenge carries one.
    pub fn server_trust(&self) -> Option<&ServerTrust> {
        self.server_trust.as_ref()
    }
}

/// Decides whether a server is trusted under pinned certificates.
pub trait TrustEvaluator: Send + Sync {
    /// Whether `space` is trusted with `pinned` as the only anchors.
    fn evaluate(&self, space: &ProtectionSpace, pinned: &[CertificateDer<'static>]) -> bool;
}

/// Pins the server trust to a set of certificates.
///
/// A recoverable failure is retried once with the exceptions recorded for
/// that evaluation installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinnedCertificateEvaluator;

impl TrustEvaluator for PinnedCertificateEvaluator {
    fn evaluate(&self, space: &ProtectionSpace, pinned: &[CertificateDer<'static>]) -> bool {
        if pinned.is_empty() {
            return false;
        }
        let Some(trust) = space.server_trust() else {
            return false;
        };

        let mut trust = trust.clone();
        trust.set_anchor_certificates(pinned.to_vec());

        let mut result = trust.evaluate();
        if let TrustResult::RecoverableTrustFailure(failure) = &result {
            tracing::debug!(target: "latchkey_net::tls", "Recoverable trust failure for '{}' ({}), retrying with exceptions", space.host(), failure);
            let exceptions = trust.copy_exceptions();
            trust.set_exceptions(exceptions);
            result = trust.evaluate();
        }

        tracing::debug!(target: "latchkey_net::tls", "Pinned trust result for '{}': {:?}", space.host(), result);
        result.is_trusted()
    }
}

/// Evaluate `space` with the default [`PinnedCertificateEvaluator`].
pub fn evaluate(space: &ProtectionSpace, pinned: Option<&CertificateDer<'static>>) -> bool {
    PinnedCertificateEvaluator.evaluate(space, pinned.map(std::slice::from_ref).unwrap_or_default())
}
