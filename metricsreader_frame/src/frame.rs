//! The time indexed table
//!
//! A [`Frame`] is a strictly ascending index of UTC instants plus an ordered
//! list of [`Column`]s, each holding exactly one optional value per index
//! row. Frames are immutable values: every operation that changes labels,
//! order or shape consumes the frame and returns a new one.

use std::{collections::BTreeSet, io};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    Error,
    label::{self, ColumnLabel, Label, SplitOptions},
    series::Series,
};

/// A labeled column of a [`Frame`]
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    label: ColumnLabel,
    values: Vec<Option<f64>>,
}

impl Column {
    /// Create a new [`Column`]
    #[must_use]
    pub fn new(label: impl Into<ColumnLabel>, values: Vec<Option<f64>>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    /// The label of this column
    #[must_use]
    pub fn label(&self) -> &ColumnLabel {
        &self.label
    }

    /// One value per index row, `None` where no value was observed
    #[must_use]
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
}

/// A time indexed table of metric values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    index: Vec<OffsetDateTime>,
    columns: Vec<Column>,
}

impl Frame {
    /// Create a [`Frame`] from an index and columns.
    ///
    /// # Errors
    ///
    /// Function will return an error if the index is not strictly ascending
    /// or any column does not hold one value per index row.
    pub fn from_parts(index: Vec<OffsetDateTime>, columns: Vec<Column>) -> Result<Self, Error> {
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::UnsortedIndex);
        }
        if let Some(column) = columns.iter().find(|c| c.values.len() != index.len()) {
            return Err(Error::ColumnLength {
                label: column.label.clone(),
                expected: index.len(),
                actual: column.values.len(),
            });
        }
        Ok(Self { index, columns })
    }

    /// Outer-join `series` on their timestamps.
    ///
    /// The index is the ascending union of every timestamp seen. Each series
    /// becomes one flat-labeled column, in input order. Should a series hold
    /// the same timestamp twice the later point wins.
    #[must_use]
    pub fn from_series(series: Vec<Series>) -> Self {
        let index: Vec<OffsetDateTime> = series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.timestamp))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = series
            .into_iter()
            .map(|s| {
                let mut values = vec![None; index.len()];
                for point in s.points {
                    if let Ok(row) = index.binary_search(&point.timestamp) {
                        values[row] = point.value;
                    }
                }
                Column::new(ColumnLabel::Flat(s.name), values)
            })
            .collect();

        Self { index, columns }
    }

    /// Outer-join whole frames on their index, keeping column order.
    #[must_use]
    pub fn concat(frames: Vec<Frame>) -> Self {
        let index: Vec<OffsetDateTime> = frames
            .iter()
            .flat_map(|f| f.index.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut columns = Vec::new();
        for frame in frames {
            let rows: Vec<usize> = frame
                .index
                .iter()
                .filter_map(|ts| index.binary_search(ts).ok())
                .collect();
            for column in frame.columns {
                let mut values = vec![None; index.len()];
                for (row, value) in rows.iter().zip(column.values) {
                    values[*row] = value;
                }
                columns.push(Column::new(column.label, values));
            }
        }

        Self { index, columns }
    }

    /// Outer-join frames, prepending each frame's key as the outermost label
    /// component of its columns.
    ///
    /// Frames split on their own may carry labels of different arity. The
    /// result is passed through [`Frame::pad_labels`] so every label of the
    /// joined frame has the same length.
    #[must_use]
    pub fn concat_labeled(frames: Vec<(String, Frame)>) -> Self {
        let frames = frames
            .into_iter()
            .map(|(key, frame)| {
                let columns = frame
                    .columns
                    .into_iter()
                    .map(|c| Column::new(c.label.prefixed(&key), c.values))
                    .collect();
                Frame {
                    index: frame.index,
                    columns,
                }
            })
            .collect();
        Self::concat(frames).pad_labels()
    }

    /// Right-pad every hierarchical label with empty components up to the
    /// longest hierarchical label of this frame. Flat labels are untouched.
    #[must_use]
    pub fn pad_labels(mut self) -> Self {
        let length = self
            .columns
            .iter()
            .filter_map(|c| match &c.label {
                ColumnLabel::Hierarchical(label) => Some(label.len()),
                ColumnLabel::Flat(_) => None,
            })
            .max()
            .unwrap_or(0);
        for column in &mut self.columns {
            if let ColumnLabel::Hierarchical(label) = &mut column.label {
                *label = label.padded(length);
            }
        }
        self
    }

    /// Return a new frame with `labels` assigned to the columns, in order.
    ///
    /// # Errors
    ///
    /// Function will return an error if the number of labels differs from
    /// the number of columns.
    pub fn with_labels(self, labels: Vec<ColumnLabel>) -> Result<Self, Error> {
        if labels.len() != self.columns.len() {
            return Err(Error::LabelCount {
                expected: self.columns.len(),
                actual: labels.len(),
            });
        }
        let columns = self
            .columns
            .into_iter()
            .zip(labels)
            .map(|(column, label)| Column::new(label, column.values))
            .collect();
        Ok(Self {
            index: self.index,
            columns,
        })
    }

    /// Return a new frame with columns stably sorted by label, ascending.
    #[must_use]
    pub fn sorted_columns(mut self) -> Self {
        self.columns.sort_by(|a, b| a.label.cmp(&b.label));
        self
    }

    /// Split the column names into hierarchical labels and sort the columns
    /// by their new labels. See [`label::split`].
    ///
    /// Columns that already carry a hierarchical label are split on their
    /// components joined with the separator.
    #[must_use]
    pub fn split_columns(self, options: &SplitOptions<'_>) -> Self {
        let names: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.label.join(options.separator))
            .collect();
        let labels = label::split(&names, options);
        let columns = self
            .columns
            .into_iter()
            .zip(labels)
            .map(|(column, label)| Column::new(label, column.values))
            .collect();
        Self {
            index: self.index,
            columns,
        }
        .sorted_columns()
    }

    /// The row index, strictly ascending
    #[must_use]
    pub fn index(&self) -> &[OffsetDateTime] {
        &self.index
    }

    /// The columns, in order
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The column labels, in order
    pub fn labels(&self) -> impl Iterator<Item = &ColumnLabel> {
        self.columns.iter().map(Column::label)
    }

    /// The first column carrying `label`
    #[must_use]
    pub fn column(&self, label: &ColumnLabel) -> Option<&Column> {
        self.columns.iter().find(|c| &c.label == label)
    }

    /// The first column carrying the hierarchical label made of `components`
    #[must_use]
    pub fn column_by_components(&self, components: &[&str]) -> Option<&Column> {
        let label = ColumnLabel::Hierarchical(components.iter().copied().collect::<Label>());
        self.column(&label)
    }

    /// Iterate over rows as `(timestamp, values)` pairs, values in column
    /// order.
    pub fn rows(&self) -> impl Iterator<Item = (OffsetDateTime, Vec<Option<f64>>)> + '_ {
        self.index.iter().enumerate().map(|(row, ts)| {
            let values = self.columns.iter().map(|c| c.values[row]).collect();
            (*ts, values)
        })
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether this frame has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of columns
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Write this frame as CSV.
    ///
    /// The header row is `timestamp` followed by each column label with its
    /// components joined by `.`. Timestamps are RFC 3339, missing values are
    /// empty fields.
    ///
    /// # Errors
    ///
    /// Function will return an error if writing fails.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), Error> {
        let mut writer = csv::Writer::from_writer(writer);
        let mut header = vec!["timestamp".to_string()];
        header.extend(self.labels().map(|l| l.join(".")));
        writer.write_record(&header)?;

        for (ts, values) in self.rows() {
            let mut record = Vec::with_capacity(values.len() + 1);
            record.push(ts.format(&Rfc3339)?);
            record.extend(
                values
                    .into_iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}
