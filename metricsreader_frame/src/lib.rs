//! Time indexed tables of monitoring metrics
//!
//! Monitoring backends hand out metrics as flat, separator-encoded names
//! attached to lists of `(timestamp, value)` points. This crate holds the
//! pieces needed to turn those into a rectangular table: [`Series`] for a
//! single named metric, [`Frame`] for many series outer-joined on their
//! timestamps, and [`label::split`] for turning flat names into hierarchical
//! column labels.
//!
//! Nothing in this crate performs I/O.

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

pub mod frame;
pub mod label;
pub mod series;

pub use frame::{Column, Frame};
pub use label::{ColumnLabel, Label, SplitOptions};
pub use series::{Point, Series};

/// Errors produced while assembling a [`Frame`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Epoch seconds could not be represented as a UTC instant
    #[error("Timestamp {0} is not representable as a UTC instant")]
    Timestamp(f64),
    /// The number of column labels does not match the number of columns
    #[error("Expected {expected} column labels, got {actual}")]
    LabelCount {
        /// Number of columns in the frame
        expected: usize,
        /// Number of labels supplied
        actual: usize,
    },
    /// A column does not have one value per row
    #[error("Column {label} holds {actual} values, the index holds {expected} rows")]
    ColumnLength {
        /// The offending column
        label: ColumnLabel,
        /// Number of rows in the index
        expected: usize,
        /// Number of values in the column
        actual: usize,
    },
    /// The row index is not strictly ascending
    #[error("Row index must be strictly ascending")]
    UnsortedIndex,
    /// See [`csv::Error`]
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// See [`time::error::Format`]
    #[error(transparent)]
    Format(#[from] time::error::Format),
}
