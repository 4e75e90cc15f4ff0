//! TLS acceptor construction.

use std::path::Path;
use std::sync::Arc;
use std::{error, fs, io};
use tokio_rustls::rustls::{Certificate, PrivateKey, ServerConfig};
use tokio_rustls::TlsAcceptor;

pub type Acceptor = Arc<TlsAcceptor>;

/// Reads the PEM files at `certfile` and `keyfile` and builds an
/// [Acceptor] from them.
pub fn build_acceptor(certfile: &Path, keyfile: &Path)
    -> Result<Acceptor, Box<dyn error::Error>>
{
    log::info!("Loading TLS certificate from {:?}", certfile.display());
    let certs = fs::read(certfile).map_err(|err| {
        log::error!("Failed to read {:?}: {}", certfile.display(), err);
        err
    })?;
    let certs: Vec<Certificate> = rustls_pemfile::certs(&mut certs.as_slice())
        .map_err(|err| {
            log::error!("Failed to parse {:?}: {}", certfile.display(), err);
            err
        })?
        .into_iter()
        .map(Certificate)
        .collect();

    log::info!("Loading TLS private key from {:?}", keyfile.display());
    let key = fs::read(keyfile).map_err(|err| {
        log::error!("Failed to read {:?}: {}", keyfile.display(), err);
        err
    })?;
    let key = {
        let mut keys = rustls_pemfile::pkcs8_private_keys(&mut key.as_slice())?;
        if keys.is_empty() {
            keys = rustls_pemfile::rsa_private_keys(&mut key.as_slice())?;
        }
        if keys.is_empty() {
            log::error!("No private key found in {:?}", keyfile.display());
            return Err(Box::new(io::Error::new(io::ErrorKind::InvalidData, "no key")));
        }
        PrivateKey(keys.remove(0))
    };

    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| {
            log::error!(
                "Failed to associate {:?} with {:?}: {}",
                certfile.display(),
                keyfile.display(),
                err
            );
            err
        })?;

    Ok(Arc::new(TlsAcceptor::from(Arc::new(config))))
}
