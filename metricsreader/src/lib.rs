//! Read monitoring metrics into time indexed tables.
//!
//! This library talks to two monitoring backends over HTTP, Graphite's render
//! and metrics APIs and PNP4Nagios' xport API, and turns what they return
//! into [`metricsreader_frame::Frame`] values: one row per timestamp, one
//! column per series, columns optionally labeled by the hierarchy encoded in
//! the series names.
//!
//! All I/O is blocking and sequential. Every call issues its requests one
//! after another through a [`http::Fetch`] implementation and surfaces the
//! first error it meets.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::cargo_common_metadata)]

pub mod config;
pub mod graphite;
pub mod http;
pub mod pnp4nagios;
pub mod reader;

pub use config::{ClientConfig, Timeout, TlsVerify};
pub use graphite::GraphiteReader;
pub use metricsreader_frame as frame;
pub use pnp4nagios::Pnp4NagiosReader;
pub use reader::{FailurePolicy, RequestContext, Targets, validate};

/// Errors produced by the readers
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request never produced a response. See [`http::Error`].
    #[error(transparent)]
    Transport(#[from] http::Error),
    /// The backend answered with a status other than 200 OK
    #[error("Unable to read URL: {url} (status: {status})")]
    RequestFailed {
        /// The requested URL, query string included
        url: String,
        /// The HTTP status code of the response
        status: u16,
    },
    /// The backend answered with a well formed but empty payload
    #[error("Received empty dataset for {}", dataset_name(.target, .service.as_deref()))]
    EmptyDataset {
        /// The requested target, or host for PNP4Nagios
        target: String,
        /// The requested service, PNP4Nagios only
        service: Option<String>,
    },
    /// The payload does not have the expected structure
    #[error("Unknown metrics format: {0}")]
    MalformedFormat(String),
    /// The caller passed an argument the reader cannot use
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The base URL does not parse, or a request path does not join onto it
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
    /// The response body is not valid JSON
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        /// The requested URL
        url: String,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },
    /// The response body is not valid CSV
    #[error("Failed to decode CSV response: {0}")]
    Csv(#[from] csv::Error),
    /// See [`metricsreader_frame::Error`]
    #[error(transparent)]
    Frame(#[from] metricsreader_frame::Error),
}

fn dataset_name(target: &str, service: Option<&str>) -> String {
    match service {
        Some(service) => format!("host {target} (service: {service})"),
        None => format!("target {target}"),
    }
}
