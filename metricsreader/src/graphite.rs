//! Graphite reader
//!
//! [`GraphiteReader::read`] fetches targets through the render API and
//! assembles them into one [`Frame`]. [`GraphiteReader::metrics`] exposes the
//! metrics API and [`GraphiteReader::walk`] enumerates the metric tree built
//! on top of it.

pub mod metrics_api;
pub mod render;
pub mod walk;

pub use metrics_api::{Expansion, MetricsApi, Node};
pub use render::{Format, RenderOptions};
pub use walk::{Step, Walk};

use metricsreader_frame::{Frame, SplitOptions};
use tracing::debug;

use crate::{
    Error,
    config::ClientConfig,
    http::{Fetch, HttpClient},
    reader::{RequestContext, Targets, read_each},
};

/// Read metrics from a Graphite host
#[derive(Debug, Clone)]
pub struct GraphiteReader<F = HttpClient> {
    context: RequestContext<F>,
}

impl GraphiteReader<HttpClient> {
    /// Create a [`GraphiteReader`] talking HTTP to the host in `config`.
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

impl<F> GraphiteReader<F>
where
    F: Fetch,
{
    /// Create a [`GraphiteReader`] for `url` issuing requests through `fetch`.
    ///
    /// # Errors
    ///
    /// Function will return an error if the URL is empty or invalid.
    pub fn with_fetch(url: &str, fetch: F) -> Result<Self, Error> {
        Ok(Self {
            context: RequestContext::with_fetch(url, fetch)?,
        })
    }

    /// The metrics API of this host
    #[must_use]
    pub fn metrics(&self) -> MetricsApi<'_, F> {
        MetricsApi::new(&self.context)
    }

    /// Read `targets` into one frame.
    ///
    /// Several targets are outer-joined on their timestamps. With
    /// `create_multiindex` the dotted series names become hierarchical
    /// labels. Labels of [`Targets::Many`] are split together, so redundant
    /// components are found across every target. Each [`Targets::Labeled`]
    /// target is split on its own and its label becomes the outermost
    /// component. Shorter labels are then right-padded with empty
    /// components so every label of the frame has the same length.
    ///
    /// # Errors
    ///
    /// Function will return an error if a request fails, a response is empty
    /// or malformed, or no target is given. See [`crate::FailurePolicy`] for
    /// how a failing target among several is handled.
    pub fn read(&self, targets: &Targets, options: &RenderOptions) -> Result<Frame, Error> {
        debug!(?targets, "reading from graphite");
        match targets {
            Targets::Single(target) => {
                let frame = render::read_target(&self.context, target, options)?;
                Ok(split(frame, options))
            }
            Targets::Many(targets) => {
                let frames = read_each(targets, options.on_error, |target| {
                    render::read_target(&self.context, target, options)
                })?;
                let frame = Frame::concat(frames.into_iter().map(|(_, frame)| frame).collect());
                Ok(split(frame, options))
            }
            Targets::Labeled(pairs) => {
                let frames = read_each(pairs, options.on_error, |(_, target)| {
                    render::read_target(&self.context, target, options)
                })?;
                let frame = Frame::concat_labeled(
                    frames
                        .into_iter()
                        .map(|((label, _), frame)| (label.clone(), split(frame, options)))
                        .collect(),
                );
                if options.create_multiindex {
                    Ok(frame.sorted_columns())
                } else {
                    Ok(frame)
                }
            }
        }
    }

    /// Walk the metric tree depth first, starting below `top` or at the root.
    ///
    /// Every step issues one find request. See [`Walk`].
    #[must_use]
    pub fn walk(&self, top: Option<&str>, start: Option<&str>, end: Option<&str>) -> Walk<'_, F> {
        Walk::new(
            self.metrics(),
            top.unwrap_or_default(),
            start.map(str::to_string),
            end.map(str::to_string),
        )
    }
}

fn split(frame: Frame, options: &RenderOptions) -> Frame {
    if options.create_multiindex {
        frame.split_columns(&SplitOptions::dotted(options.remove_redundant_indices))
    } else {
        frame
    }
}
