//! PNP4Nagios reader
//!
//! [`Pnp4NagiosReader::read`] fetches one service of one or several hosts
//! through the xport API. Series names are underscore separated; with
//! `create_multiindex` they are split into hierarchical labels with every
//! component kept.

pub mod xport;

use metricsreader_frame::{Frame, SplitOptions};
use tracing::debug;

use crate::{
    Error,
    config::ClientConfig,
    http::{Fetch, HttpClient},
    reader::{FailurePolicy, RequestContext, Targets, read_each},
};

/// Options of [`Pnp4NagiosReader::read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XportOptions {
    /// Start of the time range, any time string PNP4Nagios accepts
    pub start: Option<String>,
    /// End of the time range, any time string PNP4Nagios accepts
    pub end: Option<String>,
    /// Index of a time range preset from the PNP4Nagios configuration
    pub view: Option<u32>,
    /// Split the underscored series names into hierarchical labels
    pub create_multiindex: bool,
    /// What to do when one of several hosts fails
    pub on_error: FailurePolicy,
}

impl Default for XportOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            view: None,
            create_multiindex: true,
            on_error: FailurePolicy::Abort,
        }
    }
}

/// Read metrics from a PNP4Nagios host
#[derive(Debug, Clone)]
pub struct Pnp4NagiosReader<F = HttpClient> {
    context: RequestContext<F>,
}

impl Pnp4NagiosReader<HttpClient> {
    /// Create a [`Pnp4NagiosReader`] talking HTTP to the host in `config`.
    ///
    /// # Errors
    ///
    /// Function will return an error if the URL is empty or invalid, or the
    /// HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        Ok(Self {
            context: RequestContext::new(config)?,
        })
    }
}

impl<F> Pnp4NagiosReader<F>
where
    F: Fetch,
{
    /// Create a [`Pnp4NagiosReader`] for `url` issuing requests through
    /// `fetch`.
    ///
    /// # Errors
    ///
    /// Function will return an error if the URL is empty or invalid.
    pub fn with_fetch(url: &str, fetch: F) -> Result<Self, Error> {
        Ok(Self {
            context: RequestContext::with_fetch(url, fetch)?,
        })
    }

    /// Read `service` of `hosts` into one frame.
    ///
    /// Only [`Targets::Single`] and [`Targets::Many`] are accepted. With
    /// several hosts each host's columns are labeled on their own and the
    /// host name becomes the outermost label component. Shorter labels are
    /// right-padded with empty components to the longest one.
    ///
    /// # Errors
    ///
    /// Function will return an error if `hosts` is labeled or empty, a
    /// request fails, or a response is empty or malformed.
    pub fn read(
        &self,
        hosts: &Targets,
        service: &str,
        options: &XportOptions,
    ) -> Result<Frame, Error> {
        debug!(?hosts, service, "reading from pnp4nagios");
        match hosts {
            Targets::Single(host) => {
                let frame = self.read_host(host, service, options)?;
                Ok(split(frame, options))
            }
            Targets::Many(hosts) => {
                let frames = read_each(hosts, options.on_error, |host| {
                    self.read_host(host, service, options)
                })?;
                let frame = Frame::concat_labeled(
                    frames
                        .into_iter()
                        .map(|(host, frame)| (host.clone(), split(frame, options)))
                        .collect(),
                );
                if options.create_multiindex {
                    Ok(frame.sorted_columns())
                } else {
                    Ok(frame)
                }
            }
            Targets::Labeled(_) => Err(Error::InvalidArgument(
                "hosts has to be of type str or list".to_string(),
            )),
        }
    }

    fn read_host(
        &self,
        host: &str,
        service: &str,
        options: &XportOptions,
    ) -> Result<Frame, Error> {
        let params = [
            ("host", Some(host.to_string())),
            ("srv", Some(service.to_string())),
            ("start", options.start.clone()),
            ("end", options.end.clone()),
            ("view", options.view.map(|view| view.to_string())),
        ];
        let response = self.context.get(xport::XPORT_PATH, &params)?;
        xport::parse(&response, host, service)
    }
}

fn split(frame: Frame, options: &XportOptions) -> Frame {
    if options.create_multiindex {
        frame.split_columns(&SplitOptions::underscored())
    } else {
        frame
    }
}
