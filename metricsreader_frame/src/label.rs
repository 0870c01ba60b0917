//! Column labels and the flat-name splitter
//!
//! Monitoring backends encode hierarchy into metric names with a separator,
//! `host1.server.cpu.load` for Graphite or `host1_cpu_MIN` for PNP4Nagios.
//! [`split`] turns a batch of such names into [`Label`] tuples of equal
//! arity, optionally dropping every position that is the same across the
//! whole batch.

use std::{collections::BTreeSet, fmt};

/// A hierarchical column label, an ordered tuple of name components.
///
/// Labels order lexicographically by component. The zero-length label is
/// valid: it is what every name collapses to when all names in a batch are
/// identical and redundant positions are removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(Vec<String>);

impl Label {
    /// Create a new [`Label`] from its components
    #[must_use]
    pub fn new(components: Vec<String>) -> Self {
        Self(components)
    }

    /// The components of this label, outermost first
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Number of components
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the zero-length label
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a new label with `head` as the outermost component.
    #[must_use]
    pub fn prefixed(&self, head: &str) -> Self {
        let mut components = Vec::with_capacity(self.0.len() + 1);
        components.push(head.to_string());
        components.extend(self.0.iter().cloned());
        Self(components)
    }

    /// Return a new label right-padded with empty components to `length`.
    /// Labels already that long are returned unchanged.
    #[must_use]
    pub fn padded(&self, length: usize) -> Self {
        let mut components = self.0.clone();
        if components.len() < length {
            components.resize(length, String::new());
        }
        Self(components)
    }

    /// Join the components back together with `separator`.
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }
}

impl<S> FromIterator<S> for Label
where
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// The label of a single [`crate::Column`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnLabel {
    /// A flat series name, as delivered by the backend
    Flat(String),
    /// A hierarchical label
    Hierarchical(Label),
}

impl ColumnLabel {
    /// Return the flat name, if this label has not been split.
    #[must_use]
    pub fn as_flat(&self) -> Option<&str> {
        match self {
            ColumnLabel::Flat(name) => Some(name),
            ColumnLabel::Hierarchical(_) => None,
        }
    }

    /// Return a new label with `head` as the outermost component.
    ///
    /// A flat label becomes the two component label `(head, name)`.
    #[must_use]
    pub fn prefixed(&self, head: &str) -> Self {
        match self {
            ColumnLabel::Flat(name) => {
                ColumnLabel::Hierarchical(Label::new(vec![head.to_string(), name.clone()]))
            }
            ColumnLabel::Hierarchical(label) => ColumnLabel::Hierarchical(label.prefixed(head)),
        }
    }

    /// Render this label as a single string, joining hierarchical
    /// components with `separator`.
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        match self {
            ColumnLabel::Flat(name) => name.clone(),
            ColumnLabel::Hierarchical(label) => label.join(separator),
        }
    }
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnLabel::Flat(name) => f.write_str(name),
            ColumnLabel::Hierarchical(label) => fmt::Display::fmt(label, f),
        }
    }
}

impl From<&str> for ColumnLabel {
    fn from(name: &str) -> Self {
        ColumnLabel::Flat(name.to_string())
    }
}

impl From<String> for ColumnLabel {
    fn from(name: String) -> Self {
        ColumnLabel::Flat(name)
    }
}

impl From<Label> for ColumnLabel {
    fn from(label: Label) -> Self {
        ColumnLabel::Hierarchical(label)
    }
}

/// How [`split`] breaks flat names apart
///
/// The separator must not be empty; this is not checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOptions<'a> {
    /// The separator that encodes hierarchy in a name
    pub separator: &'a str,
    /// Strip leading and trailing separator characters before splitting
    pub strip: bool,
    /// Drop label positions that are identical across every name
    pub remove_redundant: bool,
}

impl SplitOptions<'static> {
    /// Graphite style names: dot separated, no stripping.
    #[must_use]
    pub const fn dotted(remove_redundant: bool) -> Self {
        Self {
            separator: ".",
            strip: false,
            remove_redundant,
        }
    }

    /// PNP4Nagios style names: underscore separated, stripped, every
    /// position kept.
    #[must_use]
    pub const fn underscored() -> Self {
        Self {
            separator: "_",
            strip: true,
            remove_redundant: false,
        }
    }
}

/// Split flat `names` into hierarchical labels.
///
/// Every returned label has the same length: names with fewer components are
/// right-padded with empty components. When `remove_redundant` is set and
/// there are at least two names, positions whose component is the same for
/// every name are dropped from every label; if all names are identical every
/// label collapses to the zero-length label.
///
/// The output is in input order.
#[must_use]
pub fn split<S>(names: &[S], options: &SplitOptions<'_>) -> Vec<Label>
where
    S: AsRef<str>,
{
    let separator = options.separator;
    let mut components: Vec<Vec<String>> = names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let name = if options.strip {
                name.trim_matches(|c: char| separator.contains(c))
            } else {
                name
            };
            name.split(separator).map(str::to_string).collect()
        })
        .collect();

    let max_length = components.iter().map(Vec::len).max().unwrap_or(0);
    for parts in &mut components {
        parts.resize(max_length, String::new());
    }

    if !options.remove_redundant || components.len() < 2 {
        return components.into_iter().map(Label::new).collect();
    }

    let significant = significant_positions(&components);
    components
        .into_iter()
        .map(|parts| {
            parts
                .into_iter()
                .enumerate()
                .filter(|(idx, _)| significant.contains(idx))
                .map(|(_, part)| part)
                .collect::<Label>()
        })
        .collect()
}

/// Positions at which at least two of the padded component lists disagree.
///
/// A position differs between some pair exactly when it differs from the
/// first list somewhere, so one pass against the first list suffices.
fn significant_positions(components: &[Vec<String>]) -> BTreeSet<usize> {
    let mut significant = BTreeSet::new();
    let Some((first, rest)) = components.split_first() else {
        return significant;
    };
    for other in rest {
        for (idx, (a, b)) in first.iter().zip(other).enumerate() {
            if a != b {
                significant.insert(idx);
            }
        }
    }
    significant
}
