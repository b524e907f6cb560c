//! TLS client configuration for `https://` endpoints.

use std::sync::{Arc, OnceLock};

use rustls::ClientConfig;

use crate::error::{TransportError, TransportResult};

static WEBPKI: OnceLock<Arc<ClientConfig>> = OnceLock::new();

/// Client config trusting the Mozilla root store, built once per process.
pub fn webpki_client_config() -> TransportResult<Arc<ClientConfig>> {
    if let Some(config) = WEBPKI.get() {
        return Ok(Arc::clone(config));
    }

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = client_config(roots)?;
    Ok(Arc::clone(WEBPKI.get_or_init(|| config)))
}

/// Client config trusting exactly `roots`.
pub fn client_config(roots: rustls::RootCertStore) -> TransportResult<Arc<ClientConfig>> {
    let config = ClientConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls(format!("protocol versions: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}
