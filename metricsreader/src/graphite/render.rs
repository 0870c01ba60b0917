//! The Graphite render API
//!
//! A render request returns every series matched by one target, either as a
//! JSON array of `{target, datapoints}` objects, datapoints being
//! `[value, epoch seconds]` pairs, or as CSV rows of
//! `metric,datetime,value`.

use std::collections::HashMap;

use metricsreader_frame::{Frame, Series};
use serde::Deserialize;
use serde_json::Value;
use time::{PrimitiveDateTime, macros::format_description};
use tracing::trace;

use crate::{
    Error,
    http::{Fetch, Response},
    reader::{FailurePolicy, RequestContext, is_empty_payload},
};

/// Path of the render API, relative to the host root
pub const RENDER_PATH: &str = "/render";

/// Payload format requested from the render API
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON point lists
    #[default]
    Json,
    /// CSV rows
    Csv,
}

impl Format {
    /// The value of the `format` query parameter
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
        }
    }
}

/// Options of [`super::GraphiteReader::read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Start of the time range, any time string Graphite accepts
    pub start: Option<String>,
    /// End of the time range, any time string Graphite accepts
    pub end: Option<String>,
    /// Payload format requested from the host
    pub format: Format,
    /// Split the dotted series names into hierarchical labels
    pub create_multiindex: bool,
    /// Drop label components shared by every series. Only applies with
    /// `create_multiindex`.
    pub remove_redundant_indices: bool,
    /// What to do when one of several targets fails
    pub on_error: FailurePolicy,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            format: Format::Json,
            create_multiindex: true,
            remove_redundant_indices: true,
            on_error: FailurePolicy::Abort,
        }
    }
}

/// Fetch one target and outer-join the series it matches.
pub(crate) fn read_target<F: Fetch>(
    context: &RequestContext<F>,
    target: &str,
    options: &RenderOptions,
) -> Result<Frame, Error> {
    let params = [
        ("target", Some(target.to_string())),
        ("from", options.start.clone()),
        ("until", options.end.clone()),
        ("format", Some(options.format.as_str().to_string())),
    ];
    let response = context.get(RENDER_PATH, &params)?;
    let series = match options.format {
        Format::Json => parse_json(&response, target)?,
        Format::Csv => parse_csv(&response.body, target)?,
    };
    trace!(target, series = series.len(), "rendered");
    Ok(Frame::from_series(series))
}

#[derive(Deserialize)]
struct RenderedSeries {
    target: String,
    datapoints: Vec<(Option<f64>, f64)>,
}

/// Parse a JSON render response.
///
/// # Errors
///
/// Function will return an error if the body is not JSON, holds no series,
/// or a series is not a `{target, datapoints}` object.
pub fn parse_json(response: &Response, target: &str) -> Result<Vec<Series>, Error> {
    let value: Value = response.json().map_err(|source| Error::Decode {
        url: response.url.clone(),
        source,
    })?;
    if is_empty_payload(&value) {
        return Err(Error::EmptyDataset {
            target: target.to_string(),
            service: None,
        });
    }

    let rendered: Vec<RenderedSeries> =
        serde_json::from_value(value).map_err(|e| Error::MalformedFormat(e.to_string()))?;

    let mut series = Vec::with_capacity(rendered.len());
    for rendered in rendered {
        let mut s = Series::new(rendered.target);
        for (value, timestamp) in rendered.datapoints {
            s.push_epoch(timestamp, value)?;
        }
        series.push(s);
    }
    Ok(series)
}

/// Parse a CSV render response.
///
/// Rows are `metric,datetime,value` without a header, the datetime read as
/// UTC. An empty value field is a missing value. Series are returned in the
/// order their metric first appears.
///
/// # Errors
///
/// Function will return an error if the body is empty or a row does not
/// parse.
pub fn parse_csv(body: &str, target: &str) -> Result<Vec<Series>, Error> {
    if body.trim().is_empty() {
        return Err(Error::EmptyDataset {
            target: target.to_string(),
            service: None,
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(body.as_bytes());

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut series: Vec<Series> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let (Some(metric), Some(datetime), Some(value)) =
            (record.get(0), record.get(1), record.get(2))
        else {
            return Err(Error::MalformedFormat(format!(
                "expected metric,datetime,value but got {} fields",
                record.len()
            )));
        };

        let timestamp = PrimitiveDateTime::parse(
            datetime,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
        .map_err(|e| Error::MalformedFormat(format!("invalid datetime {datetime:?}: {e}")))?
        .assume_utc();
        let value = if value.is_empty() {
            None
        } else {
            Some(value.parse::<f64>().map_err(|e| {
                Error::MalformedFormat(format!("invalid value {value:?} for {metric}: {e}"))
            })?)
        };

        let position = *positions.entry(metric.to_string()).or_insert_with(|| {
            series.push(Series::new(metric));
            series.len() - 1
        });
        series[position].push(timestamp, value);
    }
    Ok(series)
}
