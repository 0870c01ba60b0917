//! The HTTP capability the readers are built on
//!
//! Readers never talk to the network directly. They hand a resolved URL and
//! a list of query parameters to a [`Fetch`] implementation and receive a
//! [`Response`] back, whatever its status. [`HttpClient`] is the default
//! implementation, a blocking `reqwest` client configured once from a
//! [`TlsVerify`] mode and a [`Timeout`].

use std::{
    fs,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::{Certificate, Url, blocking};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::{Timeout, TlsVerify};

/// Errors produced by [`Fetch`] implementations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// See [`reqwest::Error`]
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// A transport failure reported by a non-reqwest [`Fetch`]
    #[error("Transport failure: {0}")]
    Transport(String),
    /// Reading the configured CA certificates failed
    #[error("Failed to read CA certificates from {path:?}: {source}")]
    CaPath {
        /// Configured certificate path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// The configured CA path holds no usable certificate
    #[error("No CA certificates found in {0:?}")]
    NoCertificates(PathBuf),
    /// A timeout is negative, not finite or too large
    #[error("Invalid timeout of {0} seconds")]
    InvalidTimeout(f64),
}

/// A response to a single GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The HTTP status code
    pub status: u16,
    /// The URL that was requested, query string included
    pub url: String,
    /// The response body
    pub body: String,
}

impl Response {
    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Function will return an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Issue a single GET request.
///
/// Parameters whose value is `None` are left out of the query string.
/// Implementations must return any response they receive, whatever its
/// status, and must not retry.
pub trait Fetch {
    /// Perform a GET of `url` with the query `params`.
    ///
    /// # Errors
    ///
    /// Function will return an error if no response could be obtained.
    fn get(&self, url: &Url, params: &[(&str, Option<String>)]) -> Result<Response, Error>;
}

impl<T> Fetch for &T
where
    T: Fetch + ?Sized,
{
    fn get(&self, url: &Url, params: &[(&str, Option<String>)]) -> Result<Response, Error> {
        (**self).get(url, params)
    }
}

/// The default [`Fetch`], a blocking `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: blocking::Client,
}

impl HttpClient {
    /// Create a new [`HttpClient`]
    ///
    /// # Errors
    ///
    /// Function will return an error if a timeout is invalid, the CA path
    /// cannot be read or holds no certificate, or the TLS backend fails to
    /// initialize.
    pub fn new(tls_verify: &TlsVerify, timeout: Timeout) -> Result<Self, Error> {
        let mut builder = blocking::Client::builder();

        builder = match timeout {
            Timeout::Seconds(total) => builder.timeout(duration(total)?),
            Timeout::Split { connect, read } => builder
                .connect_timeout(duration(connect)?)
                .timeout(duration(read)?),
        };

        builder = match tls_verify {
            TlsVerify::Enabled(true) => builder,
            TlsVerify::Enabled(false) => builder.danger_accept_invalid_certs(true),
            TlsVerify::Path(path) => {
                let certificates = load_certificates(path)?;
                debug!(
                    "loaded {} CA certificates from {}",
                    certificates.len(),
                    path.display()
                );
                certificates
                    .into_iter()
                    .fold(builder.tls_built_in_root_certs(false), |b, cert| {
                        b.add_root_certificate(cert)
                    })
            }
        };

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Fetch for HttpClient {
    fn get(&self, url: &Url, params: &[(&str, Option<String>)]) -> Result<Response, Error> {
        let query: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(key, value)| value.as_deref().map(|value| (*key, value)))
            .collect();

        let response = self.client.get(url.clone()).query(&query).send()?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text()?;
        Ok(Response { status, url, body })
    }
}

fn duration(seconds: f64) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(seconds).map_err(|_| Error::InvalidTimeout(seconds))
}

/// Load PEM certificates from a bundle file, or from every file in a
/// directory of certificates. Directory entries that do not parse as PEM are
/// skipped.
fn load_certificates(path: &Path) -> Result<Vec<Certificate>, Error> {
    let ca_error = |source: io::Error| Error::CaPath {
        path: path.to_path_buf(),
        source: Box::new(source),
    };

    let metadata = fs::metadata(path).map_err(ca_error)?;
    let certificates = if metadata.is_dir() {
        let mut certificates = Vec::new();
        for entry in fs::read_dir(path).map_err(ca_error)? {
            let entry_path = entry.map_err(ca_error)?.path();
            // Broken links and unreadable entries are not certificates.
            let Ok(pem) = fs::read(&entry_path) else {
                trace!("skipping unreadable {}", entry_path.display());
                continue;
            };
            match Certificate::from_pem_bundle(&pem) {
                Ok(mut found) => certificates.append(&mut found),
                Err(_) => trace!("skipping non-PEM {}", entry_path.display()),
            }
        }
        certificates
    } else {
        let pem = fs::read(path).map_err(ca_error)?;
        Certificate::from_pem_bundle(&pem)?
    };

    if certificates.is_empty() {
        return Err(Error::NoCertificates(path.to_path_buf()));
    }
    Ok(certificates)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Self-signed P-256 certificate, `CN=metricsreader test CA`, valid until 2126.
    const TEST_CA: &str = "\
-----BEGIN CERTIFICATE-----\n\
MIIBlzCCAT2gAwIBAgIURkTqb9vnreuwk3v6PR92w15BVOswCgYIKoZIzj0EAwIw\n\
IDEeMBwGA1UEAwwVbWV0cmljc3JlYWRlciB0ZXN0IENBMCAXDTI2MTAxNjE5MDkw\n\
MloYDzIxMjYwOTIyMTkwOTAyWjAgMR4wHAYDVQQDDBVtZXRyaWNzcmVhZGVyIHRl\n\
c3QgQ0EwWTATBgcqhkjOPQIBBggqhkjOPQMBBwNCAASy/504XwiVeD1JvMwNKZas\n\
3iuTPau9AABvd9lX2NszdOC46FqeD2sY67GsCejIDUrkm/zh88OVhNdIO75E2Vrs\n\
o1MwUTAdBgNVHQ4EFgQUugJTcvOS8quhR4cAEo3GHkb80f8wHwYDVR0jBBgwFoAU\n\
ugJTcvOS8quhR4cAEo3GHkb80f8wDwYDVR0TAQH/BAUwAwEB/zAKBggqhkjOPQQD\n\
AgNIADBFAiAMcRiX4qO5nCkAEJuAioXin/0Kc3XJbPzXAGBA78La/AIhAJBf6kJG\n\
tKzMClTEOZpz+jtM9bMtSGjQ6l2wY2PBnNap\n\
-----END CERTIFICATE-----\n";

    #[test]
    fn json_decodes_body() {
        let response = Response {
            status: 200,
            url: "https://example.net/".to_string(),
            body: r#"{"results": ["a.b"]}"#.to_string(),
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["results"][0], "a.b");
    }

    #[test]
    fn negative_timeouts_are_rejected() {
        assert!(matches!(duration(-1.0), Err(Error::InvalidTimeout(_))));
        assert!(matches!(duration(f64::NAN), Err(Error::InvalidTimeout(_))));
        assert_eq!(duration(2.5).unwrap(), Duration::from_millis(2500));
    }

    #[test]
    fn client_builds_without_verification() {
        assert!(HttpClient::new(&TlsVerify::Enabled(false), Timeout::Seconds(1.0)).is_ok());
        assert!(
            HttpClient::new(
                &TlsVerify::Enabled(true),
                Timeout::Split {
                    connect: 1.0,
                    read: 5.0
                }
            )
            .is_ok()
        );
    }

    #[test]
    fn missing_ca_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.pem");
        let err = HttpClient::new(&TlsVerify::Path(path), Timeout::Seconds(1.0)).unwrap_err();
        assert!(matches!(err, Error::CaPath { .. }));
    }

    #[test]
    fn ca_directory_without_certificates_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README"), "not a certificate").unwrap();
        let err = HttpClient::new(
            &TlsVerify::Path(dir.path().to_path_buf()),
            Timeout::Seconds(1.0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoCertificates(_)));
    }

    #[test]
    fn ca_directory_certificates_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test-ca.pem"), TEST_CA).unwrap();
        fs::write(dir.path().join("README"), "not a certificate").unwrap();

        let certificates = load_certificates(dir.path()).unwrap();
        assert_eq!(certificates.len(), 1);

        HttpClient::new(
            &TlsVerify::Path(dir.path().to_path_buf()),
            Timeout::Seconds(1.0),
        )
        .unwrap();
    }

    #[test]
    fn ca_bundle_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.pem");
        fs::write(&path, format!("{TEST_CA}{TEST_CA}")).unwrap();

        let certificates = load_certificates(&path).unwrap();
        assert_eq!(certificates.len(), 2);
    }
}
