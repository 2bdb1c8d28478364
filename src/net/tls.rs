//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{RootCertStore, ServerConfig};
use thiserror::Error;

use crate::config::schema::TlsOptions;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("TLS is not configured")]
    NotConfigured,
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),
    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),
    #[error("invalid TLS material: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("invalid client CA: {0}")]
    ClientVerifier(#[from] VerifierBuilderError),
}

/// Build the listener's TLS configuration.
///
/// With a client CA configured, clients must present a certificate it signed.
pub async fn load_tls_config(tls: &TlsOptions) -> Result<RustlsConfig, TlsError> {
    let (Some(cert_path), Some(key_path)) = (&tls.cert, &tls.key) else {
        return Err(TlsError::NotConfigured);
    };
    check_exists(cert_path)?;
    check_exists(key_path)?;

    let Some(ca_path) = &tls.ca else {
        return RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|source| TlsError::Io {
                path: cert_path.clone(),
                source,
            });
    };

    let certs = read_certs(cert_path)?;
    let key = read_private_key(key_path)?;

    let mut roots = RootCertStore::empty();
    for ca in read_certs(ca_path)? {
        roots.add(ca)?;
    }
    let verifier = WebPkiClientVerifier::builder(Arc::new(roots)).build()?;

    let mut config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::info!(client_ca = %ca_path.display(), "Client certificate verification enabled");
    Ok(RustlsConfig::from_config(Arc::new(config)))
}

fn check_exists(path: &Path) -> Result<(), TlsError> {
    if path.exists() {
        return Ok(());
    }
    Err(TlsError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
    })
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}
