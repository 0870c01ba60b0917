//! Reader configuration
//!
//! [`ClientConfig`] describes how to reach one backend host: base URL, TLS
//! verification mode and timeout. [`Config`] is the YAML document read by
//! `metricstool`, naming the backend kind alongside its [`ClientConfig`].
use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
}

/// Default CA trust store, the usual Linux certificate directory
pub const DEFAULT_CA_PATH: &str = "/etc/ssl/certs/";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 30.0;

/// How to verify the TLS certificate of the backend
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TlsVerify {
    /// Verify against the built-in roots (`true`) or not at all (`false`)
    Enabled(bool),
    /// Verify against the PEM bundle file or certificate directory at this
    /// path
    Path(PathBuf),
}

impl Default for TlsVerify {
    fn default() -> Self {
        TlsVerify::Path(PathBuf::from(DEFAULT_CA_PATH))
    }
}

/// Request timeout, in seconds
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Timeout {
    /// Bound on the whole request
    Seconds(f64),
    /// Separate bounds on connecting and on the request
    Split {
        /// Seconds allowed to establish the connection
        connect: f64,
        /// Seconds allowed for the request
        read: f64,
    },
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::Seconds(DEFAULT_TIMEOUT_SECONDS)
    }
}

/// How to reach a backend host
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the backend host
    pub url: String,
    /// TLS verification mode
    #[serde(default)]
    pub tls_verify: TlsVerify,
    /// Request timeout
    #[serde(default)]
    pub timeout: Timeout,
}

impl ClientConfig {
    /// Create a [`ClientConfig`] for `url` with default TLS verification and
    /// timeout.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tls_verify: TlsVerify::default(),
            timeout: Timeout::default(),
        }
    }
}

/// The backend a [`Config`] talks to
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum Backend {
    /// A Graphite host
    Graphite(ClientConfig),
    /// A PNP4Nagios host
    Pnp4nagios(ClientConfig),
}

/// Main configuration struct for `metricstool`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The backend to read from
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub backend: Backend,
}

impl Config {
    /// Read a [`Config`] from the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// Function will return an error if the file cannot be read or does not
    /// hold a valid configuration.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        contents.parse()
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        Ok(serde_yaml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn config_deserializes() -> Result<(), Error> {
        let contents = r#"
backend:
  graphite:
    url: "https://graphite.example.net"
    tls_verify: false
    timeout: 5
"#;
        let config: Config = contents.parse()?;
        assert_eq!(
            config,
            Config {
                backend: Backend::Graphite(ClientConfig {
                    url: "https://graphite.example.net".to_string(),
                    tls_verify: TlsVerify::Enabled(false),
                    timeout: Timeout::Seconds(5.0),
                }),
            }
        );
        Ok(())
    }

    #[test]
    fn defaults_apply() -> Result<(), Error> {
        let contents = r#"
backend:
  pnp4nagios:
    url: "https://nagios.example.net"
"#;
        let config: Config = contents.parse()?;
        assert_eq!(
            config.backend,
            Backend::Pnp4nagios(ClientConfig::new("https://nagios.example.net"))
        );
        Ok(())
    }

    #[test]
    fn split_timeout_and_ca_path_deserialize() -> Result<(), Error> {
        let contents = r#"
url: "https://graphite.example.net"
tls_verify: "/usr/local/share/ca.pem"
timeout:
  connect: 3.05
  read: 27
"#;
        let config: ClientConfig = serde_yaml::from_str(contents)?;
        assert_eq!(
            config.tls_verify,
            TlsVerify::Path(PathBuf::from("/usr/local/share/ca.pem"))
        );
        assert_eq!(
            config.timeout,
            Timeout::Split {
                connect: 3.05,
                read: 27.0
            }
        );
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let contents = r#"
backend:
  graphite:
    url: "https://graphite.example.net"
    retries: 3
"#;
        assert!(contents.parse::<Config>().is_err());
    }

    #[test]
    fn config_reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend:\n  graphite:\n    url: \"http://localhost\"").unwrap();
        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(
            config.backend,
            Backend::Graphite(ClientConfig::new("http://localhost"))
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::from_path(Path::new("/nonexistent/metricstool.yaml")).unwrap_err();
        assert!(matches!(err, Error::ReadFile { .. }));
    }
}
