//! TLS handshake tests against a local server with a self-signed certificate.

#![cfg(feature = "integration-tests")]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use latchkey_net::{HttpClient, NetworkError};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A self-signed certificate for `localhost`, in DER and PEM form.
struct ServerCert {
    der: CertificateDer<'static>,
    pem: String,
    key: PrivateKeyDer<'static>,
}

fn server_cert() -> ServerCert {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    ServerCert {
        der: certified.cert.der().clone(),
        pem: certified.cert.pem(),
        key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der())),
    }
}

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Serve `hello` over TLS until the test ends.
async fn start_server(cert: &ServerCert) -> SocketAddr {
    let config = rustls::ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der.clone()], cert.key.clone_key())
        .unwrap();
    serve(config).await.0
}

/// Serve `hello` with `config`, recording whether a client certificate was
/// presented.
async fn serve(config: rustls::ServerConfig) -> (SocketAddr, Arc<AtomicBool>) {
    let acceptor = TlsAcceptor::from(Arc::new(config));
    let saw_client_cert = Arc::new(AtomicBool::new(false));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let seen = saw_client_cert.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                if tls.get_ref().1.peer_certificates().is_some_and(|c| !c.is_empty()) {
                    seen.store(true, Ordering::SeqCst);
                }
                let mut buf = vec![0u8; 4096];
                let mut request = Vec::new();
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tls
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello")
                    .await;
                let _ = tls.shutdown().await;
            });
        }
    });

    (addr, saw_client_cert)
}

/// A private CA that issues both the server and the client certificate.
struct PrivateCa {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl PrivateCa {
    fn new() -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, "Latchkey Test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    /// Issue a certificate for `name`, returning it with its PKCS#8 key.
    fn issue(&self, name: &str) -> (CertificateDer<'static>, Vec<u8>) {
        let params = CertificateParams::new(vec![name.to_string()]).unwrap();
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        (cert.der().clone(), key.serialize_der())
    }

    /// A PKCS#12 container with an identity for `name` and this CA.
    fn pkcs12(&self, name: &str, password: &str) -> Vec<u8> {
        let (leaf, key) = self.issue(name);
        let chain = [
            p12_keystore::Certificate::from_der(leaf.as_ref()).unwrap(),
            p12_keystore::Certificate::from_der(self.der().as_ref()).unwrap(),
        ];
        let mut store = p12_keystore::KeyStore::new();
        store.add_entry(
            "client",
            p12_keystore::KeyStoreEntry::PrivateKeyChain(p12_keystore::PrivateKeyChain::new(
                key, [3u8; 20], chain,
            )),
        );
        store.writer(password).write().unwrap()
    }

    /// A server that requires a client certificate issued by this CA.
    async fn mutual_tls_server(&self) -> (SocketAddr, Arc<AtomicBool>) {
        let (leaf, key) = self.issue("localhost");

        let mut roots = RootCertStore::empty();
        roots.add(self.der()).unwrap();
        let client_verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider())
            .build()
            .unwrap();

        let config = rustls::ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_client_cert_verifier(client_verifier)
            .with_single_cert(
                vec![leaf, self.der()],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key)),
            )
            .unwrap();
        serve(config).await
    }
}

fn url(addr: SocketAddr) -> String {
    format!("https://localhost:{}/status", addr.port())
}

fn unrelated_cert() -> Vec<u8> {
    rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .unwrap()
        .cert
        .der()
        .to_vec()
}

#[tokio::test]
async fn test_pinned_certificate_accepted() {
    let cert = server_cert();
    let addr = start_server(&cert).await;

    let body = HttpClient::builder()
        .url(url(addr))
        .certificate(cert.der.to_vec(), None::<String>)
        .timeout(Duration::from_secs(10))
        .build()
        .get()
        .await
        .expect("request task panicked")
        .expect("Request failed");

    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn test_pinned_pem_certificate_accepted() {
    let cert = server_cert();
    let addr = start_server(&cert).await;

    let result = HttpClient::builder()
        .url(url(addr))
        .certificate(cert.pem.clone().into_bytes(), None::<String>)
        .pinned_host_domain("localhost")
        .build()
        .get()
        .await
        .expect("request task panicked");

    assert!(result.is_ok(), "unexpected result: {result:?}");
}

#[tokio::test]
async fn test_unrelated_pin_rejected() {
    let cert = server_cert();
    let addr = start_server(&cert).await;

    let result = HttpClient::builder()
        .url(url(addr))
        .certificate(unrelated_cert(), None::<String>)
        .build()
        .get()
        .await
        .expect("request task panicked");

    assert!(matches!(result, Err(NetworkError::Transport { .. })));
}

#[tokio::test]
async fn test_trust_all_overrides_pin() {
    let cert = server_cert();
    let addr = start_server(&cert).await;

    let result = HttpClient::builder()
        .url(url(addr))
        .certificate(unrelated_cert(), None::<String>)
        .trust_all_tls(true)
        .build()
        .get()
        .await
        .expect("request task panicked");

    assert!(result.is_ok(), "unexpected result: {result:?}");
}

#[tokio::test]
async fn test_pinned_host_domain_mismatch_rejected() {
    let cert = server_cert();
    let addr = start_server(&cert).await;

    let result = HttpClient::builder()
        .url(url(addr))
        .trust_all_tls(true)
        .pinned_host_domain("api.example.com")
        .build()
        .get()
        .await
        .expect("request task panicked");

    assert!(matches!(result, Err(NetworkError::Transport { .. })));
}

#[tokio::test]
async fn test_self_signed_rejected_by_default() {
    let cert = server_cert();
    let addr = start_server(&cert).await;

    let result = HttpClient::builder()
        .url(url(addr))
        .build()
        .get()
        .await
        .expect("request task panicked");

    assert!(matches!(result, Err(NetworkError::Transport { .. })));
}

#[tokio::test]
async fn test_client_identity_presented() {
    let ca = PrivateCa::new();
    let (addr, saw_client_cert) = ca.mutual_tls_server().await;

    let body = HttpClient::builder()
        .url(url(addr))
        .certificate(ca.pkcs12("client.example.com", "secret"), Some("secret"))
        .pinned_host_domain("localhost")
        .timeout(Duration::from_secs(10))
        .build()
        .get()
        .await
        .expect("request task panicked")
        .expect("Request failed");

    assert_eq!(&body[..], b"hello");
    assert!(saw_client_cert.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_client_identity_required() {
    let ca = PrivateCa::new();
    let (addr, saw_client_cert) = ca.mutual_tls_server().await;

    let result = HttpClient::builder()
        .url(url(addr))
        .trust_all_tls(true)
        .build()
        .get()
        .await
        .expect("request task panicked");

    assert!(matches!(result, Err(NetworkError::Transport { .. })));
    assert!(!saw_client_cert.load(Ordering::SeqCst));
}
