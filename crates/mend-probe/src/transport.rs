//! Time-boxed HTTP/1.1 GET over tokio TCP, with rustls for `https://`.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::tls::webpki_client_config;

const PROBE_USER_AGENT: &str = concat!("mend-probe/", env!("CARGO_PKG_VERSION"));

/// What came back from an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Boxed future returned by [`Transport::get`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = TransportResult<Response>> + Send + 'a>>;

/// Fetches a URL. Injected into probes and checks for testability.
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a>;
}

/// The production transport: [`request_with`] with a fixed timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Duration,
    tls: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Verifies `https://` endpoints against the Mozilla root store.
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        Ok(Self::with_tls(timeout, webpki_client_config()?))
    }

    pub fn with_tls(timeout: Duration, tls: Arc<ClientConfig>) -> Self {
        Self { timeout, tls }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a> {
        Box::pin(request_with(url, self.timeout, &self.tls))
    }
}

/// Perform a GET against `url`, giving up after `timeout`.
pub async fn request(url: &str, timeout: Duration) -> TransportResult<Response> {
    request_with(url, timeout, &webpki_client_config()?).await
}

/// [`request`] with an explicit TLS client config for `https://` URLs.
///
/// The connection, TLS session included, lives inside the timed future;
/// when the deadline fires the future is dropped and the socket closes
/// with it.
pub async fn request_with(url: &str, timeout: Duration, tls: &Arc<ClientConfig>) -> TransportResult<Response> {
    let target = Target::parse(url)?;

    match tokio::time::timeout(timeout, connect_and_exchange(&target, tls)).await {
        Ok(result) => {
            if let Err(e) = &result {
                debug!(error = %e, %url, "request failed");
            }
            result
        }
        Err(_) => {
            debug!(%url, ?timeout, "request timed out, connection dropped");
            Err(TransportError::Timeout(timeout))
        }
    }
}

struct Target {
    tls: bool,
    host: String,
    port: u16,
    authority: String,
    path: String,
}

impl Target {
    fn parse(url: &str) -> TransportResult<Self> {
        let uri: http::Uri = url
            .parse()
            .map_err(|_| TransportError::InvalidUrl(url.to_string()))?;

        let tls = match uri.scheme_str() {
            Some("http") => false,
            Some("https") => true,
            Some(_) => return Err(TransportError::UnsupportedScheme(url.to_string())),
            None => return Err(TransportError::InvalidUrl(url.to_string())),
        };

        let authority = uri
            .authority()
            .ok_or_else(|| TransportError::InvalidUrl(url.to_string()))?;
        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        Ok(Self {
            tls,
            host,
            port: authority.port_u16().unwrap_or(if tls { 443 } else { 80 }),
            authority: authority.as_str().to_string(),
            path: uri
                .path_and_query()
                .map(|p| p.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
        })
    }
}

async fn connect_and_exchange(target: &Target, tls: &Arc<ClientConfig>) -> TransportResult<Response> {
    let stream = tokio::net::TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    if !target.tls {
        return exchange(stream, target).await;
    }

    let server_name = ServerName::try_from(target.host.clone())
        .map_err(|e| TransportError::Tls(format!("server name {:?}: {e}", target.host)))?;
    let stream = TlsConnector::from(Arc::clone(tls))
        .connect(server_name, stream)
        .await
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    exchange(stream, target).await
}

async fn exchange<S>(stream: S, target: &Target) -> TransportResult<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = http1::handshake(io)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    let req = http::Request::builder()
        .method("GET")
        .uri(target.path.as_str())
        .header(HOST, target.authority.as_str())
        .header(USER_AGENT, PROBE_USER_AGENT)
        .body(Empty::<Bytes>::new())
        .map_err(|e| TransportError::Request(e.to_string()))?;

    let response = async move {
        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
            .to_bytes();

        Ok(Response {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
            headers,
        })
    };

    // Drive the connection alongside the request; both are dropped together.
    tokio::pin!(conn);
    tokio::pin!(response);
    tokio::select! {
        biased;
        result = &mut response => result,
        driven = &mut conn => {
            driven.map_err(|e| TransportError::Request(e.to_string()))?;
            response.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::routing::get;
    use tokio::io::AsyncReadExt;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn request_returns_status_body_and_headers() {
        let base = serve(Router::new().route(
            "/broker",
            get(|| async { ([("x-portal", "broker")], "broker portal") }),
        ))
        .await;

        let resp = request(&format!("{base}/broker"), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.is_success());
        assert_eq!(resp.body, "broker portal");
        assert_eq!(resp.headers.get("x-portal").map(String::as_str), Some("broker"));
    }

    #[tokio::test]
    async fn server_errors_are_responses_not_transport_errors() {
        let base = serve(Router::new().route(
            "/",
            get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
        ))
        .await;

        let resp = request(&base, Duration::from_secs(2)).await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn closed_port_is_connect_error() {
        let result = request("http://127.0.0.1:1/", Duration::from_millis(500)).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn unsupported_and_invalid_urls() {
        assert!(matches!(
            request("ftp://example.com/", Duration::from_secs(1)).await,
            Err(TransportError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            request("not a url", Duration::from_secs(1)).await,
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn timeout_closes_the_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();

        // Accept, swallow the request, never answer; report when the peer hangs up.
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            let _ = closed_tx.send(());
        });

        let started = tokio::time::Instant::now();
        let result = request(&format!("http://{addr}/"), Duration::from_millis(150)).await;
        assert_eq!(result, Err(TransportError::Timeout(Duration::from_millis(150))));
        assert!(started.elapsed() < Duration::from_secs(2));

        tokio::time::timeout(Duration::from_secs(2), closed_rx)
            .await
            .expect("server should observe the client closing the socket")
            .unwrap();
    }

    #[tokio::test]
    async fn http_transport_uses_its_timeout() {
        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        assert_eq!(transport.timeout(), Duration::from_millis(200));
        let result = transport.get("http://127.0.0.1:1/").await;
        assert!(result.is_err());
    }

    // ── TLS ─────────────────────────────────────────────────────────

    struct TlsServer {
        url: String,
        cert: rustls::pki_types::CertificateDer<'static>,
    }

    /// One-shot HTTPS server with a self-signed cert for `localhost`.
    async fn serve_tls(body: &'static str) -> TlsServer {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();
        let cert_der = cert.der().clone();
        let key_der = rustls::pki_types::PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap();

        let server_config = rustls::ServerConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;

            let (socket, _) = listener.accept().await.unwrap();
            let Ok(mut tls) = acceptor.accept(socket).await else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match tls.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = tls.write_all(response.as_bytes()).await;
            let _ = tls.shutdown().await;
        });

        TlsServer {
            url: format!("https://localhost:{port}/"),
            cert: cert_der,
        }
    }

    #[tokio::test]
    async fn https_endpoint_is_fetched_over_tls() {
        let server = serve_tls("secure portal").await;
        let mut roots = rustls::RootCertStore::empty();
        roots.add(server.cert.clone()).unwrap();
        let transport = HttpTransport::with_tls(Duration::from_secs(2), crate::tls::client_config(roots).unwrap());

        let resp = transport.get(&server.url).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "secure portal");
    }

    #[tokio::test]
    async fn untrusted_certificate_is_a_tls_error() {
        let server = serve_tls("secure portal").await;
        let result = request(&server.url, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(TransportError::Tls(_))), "{result:?}");
    }

    #[test]
    fn https_defaults_to_port_443() {
        let target = Target::parse("https://example.com/health").unwrap();
        assert!(target.tls);
        assert_eq!(target.port, 443);
        assert_eq!(target.path, "/health");
        assert_eq!(Target::parse("http://example.com").unwrap().port, 80);
    }
}
