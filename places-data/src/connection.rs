//! Connection settings and the shared HTTP client for the search cluster.
//!
//! Credentials and the cluster URL come from the environment with local
//! development defaults; the CA certificate path is supplied by the caller.
//! Every request carries HTTP basic authentication.

use std::io::Read;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use places_core::BackendError;
use reqwest::{Certificate, Client, Method, RequestBuilder};
use thiserror::Error;
use url::Url;

use crate::fs::open_utf8_file;

/// Environment variable holding the cluster URL.
pub const ENV_ELASTIC_URL: &str = "ELASTIC_URL";
/// Environment variable holding the basic-auth user.
pub const ENV_ELASTIC_USER: &str = "ELASTIC_USER";
/// Environment variable holding the basic-auth password.
pub const ENV_ELASTIC_PASSWORD: &str = "ELASTIC_PASSWORD";

/// Cluster URL used when none is configured.
pub const DEFAULT_URL: &str = "https://localhost:9200";
/// Basic-auth user used when none is configured.
pub const DEFAULT_USER: &str = "elastic";
/// Basic-auth password used when none is configured.
pub const DEFAULT_PASSWORD: &str = "elastic";
/// Name of the places index.
pub const DEFAULT_INDEX: &str = "places";
/// Default user agent for cluster requests.
pub const DEFAULT_USER_AGENT: &str = "places-engine/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where and how to reach the search cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Base URL of the cluster.
    pub url: String,
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// PEM file with an extra trusted root certificate.
    pub ca_cert: Option<Utf8PathBuf>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            username: DEFAULT_USER.to_owned(),
            password: DEFAULT_PASSWORD.to_owned(),
            ca_cert: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl ConnectionSettings {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset or
    /// empty variables.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_owned())
        };
        Self {
            url: read(ENV_ELASTIC_URL, DEFAULT_URL),
            username: read(ENV_ELASTIC_USER, DEFAULT_USER),
            password: read(ENV_ELASTIC_PASSWORD, DEFAULT_PASSWORD),
            ..Self::default()
        }
    }

    /// Trust the PEM certificate at `path`.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the cluster URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Errors raised while preparing a [`Connection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The cluster URL is not a valid absolute URL.
    #[error("invalid cluster URL {url:?}: {source}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// The CA certificate file could not be read.
    #[error("failed to read CA certificate at {path}: {source}")]
    ReadCertificate {
        /// Certificate path.
        path: Utf8PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The CA certificate is not valid PEM.
    #[error("invalid CA certificate at {path}: {source}")]
    InvalidCertificate {
        /// Certificate path.
        path: Utf8PathBuf,
        /// Parser error.
        #[source]
        source: reqwest::Error,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Authenticated client bound to one cluster.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct Connection {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    timeout: Duration,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Build a client for `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the URL is invalid, the certificate
    /// cannot be loaded, or the client fails to build.
    pub fn open(settings: &ConnectionSettings) -> Result<Self, ConnectionError> {
        let base_url = parse_base_url(&settings.url)?;
        let mut builder = Client::builder()
            .user_agent(&settings.user_agent)
            .connect_timeout(settings.timeout)
            .timeout(settings.timeout);
        if let Some(path) = &settings.ca_cert {
            builder = builder.add_root_certificate(load_certificate(path)?);
        }
        let client = builder.build().map_err(ConnectionError::HttpClient)?;
        Ok(Self {
            client,
            base_url,
            username: settings.username.clone(),
            password: settings.password.clone(),
            timeout: settings.timeout,
        })
    }

    /// Base URL of the cluster.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for `path` below the cluster root.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Start an authenticated request.
    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Map a transport failure onto the backend error taxonomy.
    pub(crate) fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> BackendError {
        if error.is_timeout() {
            return BackendError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return BackendError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        if error.is_decode() {
            return BackendError::MalformedResponse {
                url: url.to_owned(),
                message: error.to_string(),
            };
        }

        BackendError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConnectionError> {
    Url::parse(raw).map_err(|source| ConnectionError::InvalidUrl {
        url: raw.to_owned(),
        source,
    })
}

fn load_certificate(path: &Utf8Path) -> Result<Certificate, ConnectionError> {
    let read_error = |source| ConnectionError::ReadCertificate {
        path: path.to_path_buf(),
        source,
    };
    let mut pem = Vec::new();
    open_utf8_file(path)
        .map_err(read_error)?
        .read_to_end(&mut pem)
        .map_err(read_error)?;
    Certificate::from_pem(&pem).map_err(|source| ConnectionError::InvalidCertificate {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[rstest]
    fn defaults_apply_when_environment_is_empty() {
        let settings = ConnectionSettings::from_lookup(lookup(&[]));
        assert_eq!(settings.url, DEFAULT_URL);
        assert_eq!(settings.username, DEFAULT_USER);
        assert_eq!(settings.password, DEFAULT_PASSWORD);
        assert_eq!(settings.ca_cert, None);
    }

    #[rstest]
    fn environment_overrides_defaults() {
        let settings = ConnectionSettings::from_lookup(lookup(&[
            (ENV_ELASTIC_URL, "http://search:9200"),
            (ENV_ELASTIC_USER, "reader"),
            (ENV_ELASTIC_PASSWORD, ""),
        ]));
        assert_eq!(settings.url, "http://search:9200");
        assert_eq!(settings.username, "reader");
        assert_eq!(settings.password, DEFAULT_PASSWORD);
    }

    #[rstest]
    #[case("http://localhost:9200", "places/_search", "http://localhost:9200/places/_search")]
    #[case("http://localhost:9200/", "/places/_bulk", "http://localhost:9200/places/_bulk")]
    #[case("https://es.example.com/proxy/", "places", "https://es.example.com/proxy/places")]
    fn endpoint_joins_paths(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        let settings = ConnectionSettings::default().with_url(base);
        let connection = Connection::open(&settings).expect("connection should build");
        assert_eq!(connection.endpoint(path), expected);
    }

    #[rstest]
    fn invalid_url_is_rejected() {
        let settings = ConnectionSettings::default().with_url("not a url");
        let err = Connection::open(&settings).expect_err("invalid url");
        assert!(matches!(err, ConnectionError::InvalidUrl { .. }));
    }

    #[rstest]
    fn missing_certificate_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("missing.pem")).expect("utf-8 path");
        let settings = ConnectionSettings::default().with_ca_cert(path.clone());
        let err = Connection::open(&settings).expect_err("missing certificate");
        match err {
            ConnectionError::ReadCertificate { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected ReadCertificate, got {other:?}"),
        }
    }

    #[rstest]
    fn debug_redacts_password() {
        let connection = Connection::open(&ConnectionSettings::default()).expect("connection");
        let rendered = format!("{connection:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("password: \"elastic\""));
    }
}
