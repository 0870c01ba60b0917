//! Shared plumbing for the backend readers
//!
//! A [`RequestContext`] binds a base URL to a [`Fetch`] implementation. Every
//! request a reader makes goes through [`RequestContext::get`], which joins
//! the request path onto the base URL, issues exactly one GET and passes the
//! response through [`validate`].

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    Error,
    config::ClientConfig,
    http::{Fetch, HttpClient, Response},
};

/// The one status code a backend may answer with
pub const STATUS_OK: u16 = 200;

/// Reject any response whose status is not 200 OK.
///
/// # Errors
///
/// Function will return [`Error::RequestFailed`] carrying the requested URL
/// and the status code if the status is not 200.
pub fn validate(response: Response) -> Result<Response, Error> {
    if response.status == STATUS_OK {
        Ok(response)
    } else {
        Err(Error::RequestFailed {
            url: response.url,
            status: response.status,
        })
    }
}

/// Base URL and HTTP capability shared by every request of a reader
///
/// The context is never mutated after construction.
#[derive(Debug, Clone)]
pub struct RequestContext<F = HttpClient> {
    base: Url,
    fetch: F,
}

impl RequestContext<HttpClient> {
    /// Create a [`RequestContext`] backed by a new [`HttpClient`].
    ///
    /// # Errors
    ///
    /// Function will return an error if the URL is empty or invalid, or the
    /// HTTP client cannot be built from the TLS and timeout settings.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let base = parse_base(&config.url)?;
        let fetch = HttpClient::new(&config.tls_verify, config.timeout)?;
        Ok(Self { base, fetch })
    }
}

impl<F> RequestContext<F>
where
    F: Fetch,
{
    /// Create a [`RequestContext`] issuing its requests through `fetch`.
    ///
    /// # Errors
    ///
    /// Function will return an error if the URL is empty or invalid.
    pub fn with_fetch(url: &str, fetch: F) -> Result<Self, Error> {
        Ok(Self {
            base: parse_base(url)?,
            fetch,
        })
    }

    /// The base URL requests are resolved against
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` against the base URL.
    ///
    /// An absolute path replaces the base path, a relative one replaces its
    /// last segment.
    ///
    /// # Errors
    ///
    /// Function will return an error if `path` cannot be joined.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        self.base.join(path).map_err(|e| Error::InvalidUrl {
            url: format!("{}{path}", self.base),
            reason: e.to_string(),
        })
    }

    /// GET `path` with the query `params` and validate the response.
    ///
    /// # Errors
    ///
    /// Function will return an error if the path cannot be joined, the
    /// request fails in transport, or the response status is not 200.
    pub fn get(&self, path: &str, params: &[(&str, Option<String>)]) -> Result<Response, Error> {
        let url = self.url(path)?;
        debug!(%url, ?params, "GET");
        let response = self.fetch.get(&url, params)?;
        validate(response)
    }
}

fn parse_base(url: &str) -> Result<Url, Error> {
    if url.trim().is_empty() {
        return Err(Error::InvalidArgument("No URL specified".to_string()));
    }
    Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// What to read: one name, several, or several under caller chosen labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// A single target or host
    Single(String),
    /// Several targets or hosts, read in order
    Many(Vec<String>),
    /// Several targets, each read under its own label
    Labeled(Vec<(String, String)>),
}

impl From<&str> for Targets {
    fn from(target: &str) -> Self {
        Targets::Single(target.to_string())
    }
}

impl From<String> for Targets {
    fn from(target: String) -> Self {
        Targets::Single(target)
    }
}

impl From<Vec<String>> for Targets {
    fn from(targets: Vec<String>) -> Self {
        Targets::Many(targets)
    }
}

impl From<Vec<&str>> for Targets {
    fn from(targets: Vec<&str>) -> Self {
        Targets::Many(targets.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<(String, String)>> for Targets {
    fn from(targets: Vec<(String, String)>) -> Self {
        Targets::Labeled(targets)
    }
}

const TARGET_KINDS: &str = "targets has to be of type str, list or dict";

impl TryFrom<Value> for Targets {
    type Error = Error;

    /// Accept a JSON string, array of strings, or object of strings. Object
    /// entries keep the order they appear in the document.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let not_a_string = || Error::InvalidArgument(TARGET_KINDS.to_string());
        match value {
            Value::String(target) => Ok(Targets::Single(target)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(target) => Ok(target),
                    _ => Err(not_a_string()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Targets::Many),
            Value::Object(map) => map
                .into_iter()
                .map(|(label, item)| match item {
                    Value::String(target) => Ok((label, target)),
                    _ => Err(not_a_string()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Targets::Labeled),
            _ => Err(not_a_string()),
        }
    }
}

/// What a multi-target read does when one of its targets fails
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole read with the first error
    #[default]
    Abort,
    /// Log the failure, drop the target and carry on. The read fails with
    /// the first error only if every target failed.
    Skip,
}

/// Read every item in order through `read`, applying `policy` to failures.
pub(crate) fn read_each<'a, T, R>(
    items: &'a [T],
    policy: FailurePolicy,
    mut read: R,
) -> Result<Vec<(&'a T, metricsreader_frame::Frame)>, Error>
where
    T: std::fmt::Debug,
    R: FnMut(&T) -> Result<metricsreader_frame::Frame, Error>,
{
    if items.is_empty() {
        return Err(Error::InvalidArgument("no targets given".to_string()));
    }

    let mut frames = Vec::with_capacity(items.len());
    let mut first_error = None;
    for item in items {
        match read(item) {
            Ok(frame) => frames.push((item, frame)),
            Err(err) => match policy {
                FailurePolicy::Abort => return Err(err),
                FailurePolicy::Skip => {
                    warn!(?item, %err, "skipping target");
                    first_error.get_or_insert(err);
                }
            },
        }
    }

    match first_error {
        Some(err) if frames.is_empty() => Err(err),
        _ => Ok(frames),
    }
}

/// Whether a decoded body holds no dataset: `null`, `[]` or `{}`.
pub(crate) fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
