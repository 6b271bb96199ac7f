//! HTTPS connector using rustls.

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;

use crate::ClientConfig;

/// Create an HTTPS connector with rustls.
///
/// Plain `http://` URLs are accepted too. TLS trusts the Mozilla root
/// certificates, and connecting gives up after `config.connect_timeout`.
#[must_use]
pub fn https_connector(config: &ClientConfig) -> HttpsConnector<HttpConnector> {
    let root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));

    HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_connector_from_config() {
        let _connector = https_connector(&ClientConfig::default());
    }
}
