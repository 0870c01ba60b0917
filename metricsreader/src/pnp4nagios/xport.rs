//! The PNP4Nagios xport API
//!
//! An xport response is one object holding a legend, the column names, and
//! rows of `{t, v}` where `t` is the epoch timestamp and `v` holds one value
//! per legend entry. Numbers may arrive as JSON numbers or as strings.

use metricsreader_frame::{Frame, Series};
use serde_json::Value;

use crate::{Error, http::Response, reader::is_empty_payload};

/// Path of the xport API, relative to the base URL
pub const XPORT_PATH: &str = "pnp4nagios/xport/json";

/// Parse an xport response for `host` and `service` into a frame, one
/// column per legend entry.
///
/// # Errors
///
/// Function will return an error if the body is not JSON, is empty, lacks
/// the legend or rows, or a row does not hold one value per legend entry.
pub fn parse(response: &Response, host: &str, service: &str) -> Result<Frame, Error> {
    let body: Value = response.json().map_err(|source| Error::Decode {
        url: response.url.clone(),
        source,
    })?;

    if is_empty_payload(&body) {
        return Err(empty(host, service));
    }

    let legend = match body.pointer("/meta/legend/entry") {
        Some(Value::Array(entries)) => entries.iter().map(name).collect::<Result<Vec<_>, _>>()?,
        Some(entry) => vec![name(entry)?],
        None => return Err(malformed("missing meta.legend.entry")),
    };
    let Some(Value::Array(rows)) = body.pointer("/data/row") else {
        return Err(malformed("missing data.row"));
    };

    let mut series: Vec<Series> = legend.into_iter().map(Series::new).collect();
    for row in rows {
        let timestamp = row
            .get("t")
            .map(sample)
            .transpose()?
            .flatten()
            .ok_or_else(|| malformed("row without timestamp"))?;
        let values = match row.get("v") {
            Some(Value::Array(values)) => {
                values.iter().map(sample).collect::<Result<Vec<_>, _>>()?
            }
            Some(value) => vec![sample(value)?],
            None => return Err(malformed("row without values")),
        };
        if values.len() != series.len() {
            return Err(malformed(&format!(
                "row at {timestamp} holds {} values for {} legend entries",
                values.len(),
                series.len()
            )));
        }
        for (s, value) in series.iter_mut().zip(values) {
            s.push_epoch(timestamp, value)?;
        }
    }

    Ok(Frame::from_series(series))
}

fn empty(host: &str, service: &str) -> Error {
    Error::EmptyDataset {
        target: host.to_string(),
        service: Some(service.to_string()),
    }
}

fn malformed(reason: &str) -> Error {
    Error::MalformedFormat(reason.to_string())
}

fn name(entry: &Value) -> Result<String, Error> {
    match entry {
        Value::String(name) => Ok(name.clone()),
        other => Err(malformed(&format!("legend entry {other} is not a string"))),
    }
}

/// A number, a numeric string, `null` or `NaN`. The last two are no value.
fn sample(value: &Value) -> Result<Option<f64>, Error> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_nan() => Ok(None),
        Some(n) => Ok(Some(n)),
        None => Err(malformed(&format!("{value} is not a number"))),
    }
}
