//! TLS material resolution for the Docker daemon connection.
//!
//! Mirrors the Docker CLI conventions: certificate paths default to
//! `ca.pem` / `cert.pem` / `key.pem` under `DOCKER_CERT_PATH` (falling
//! back to `/etc/ssl/docker`), individually overridable by flag.

use std::path::PathBuf;

use havoc_core::client::TlsMaterial;

/// Default directory for TLS material when `DOCKER_CERT_PATH` is unset.
const DEFAULT_CERT_DIR: &str = "/etc/ssl/docker";

/// Resolve TLS material from flags and environment.
///
/// Returns `None` unless `--tls` or `--tlsverify` was given. Note that
/// the underlying client always verifies the daemon certificate; plain
/// `--tls` does not disable verification.
pub fn resolve(
    tls: bool,
    tlsverify: bool,
    cacert: Option<PathBuf>,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
) -> Option<TlsMaterial> {
    if !(tls || tlsverify) {
        return None;
    }
    let dir = std::env::var_os("DOCKER_CERT_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_DIR));
    Some(TlsMaterial {
        ca: cacert.unwrap_or_else(|| dir.join("ca.pem")),
        cert: cert.unwrap_or_else(|| dir.join("cert.pem")),
        key: key.unwrap_or_else(|| dir.join("key.pem")),
    })
}
