//! Depth first walk of the Graphite metric tree

use std::{collections::HashSet, iter::FusedIterator};

use tracing::trace;

use super::metrics_api::MetricsApi;
use crate::{Error, http::Fetch};

/// One position of a [`Walk`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The path walked, empty at the root
    pub path: String,
    /// Children of `path` that have children of their own
    pub nodes: Vec<String>,
    /// Children of `path` that hold data
    pub leaves: Vec<String>,
}

/// Pre-order, depth first walk of the metric tree
///
/// Each call to [`Iterator::next`] issues one find request for the next
/// pending path and yields its [`Step`] before descending into its nodes.
/// Siblings are visited in the order the host returned them. After the
/// first error the walk yields nothing more.
#[derive(Debug)]
pub struct Walk<'a, F> {
    api: MetricsApi<'a, F>,
    start: Option<String>,
    end: Option<String>,
    pending: Vec<String>,
    failed: bool,
}

impl<'a, F> Walk<'a, F>
where
    F: Fetch,
{
    pub(crate) fn new(
        api: MetricsApi<'a, F>,
        top: &str,
        start: Option<String>,
        end: Option<String>,
    ) -> Self {
        Self {
            api,
            start,
            end,
            pending: vec![top.to_string()],
            failed: false,
        }
    }

    fn step(&self, path: &str) -> Result<Step, Error> {
        let path = path.trim_end_matches(&['.', '*'][..]);
        let query = if path.is_empty() {
            "*".to_string()
        } else {
            format!("{path}.*")
        };
        trace!(path, %query, "walking");

        let found = self
            .api
            .find(&query, self.start.as_deref(), self.end.as_deref())?;

        let mut seen = HashSet::with_capacity(found.len());
        let mut nodes = Vec::new();
        let mut leaves = Vec::new();
        for node in found {
            if !seen.insert(node.id.clone()) {
                continue;
            }
            if node.allow_children {
                nodes.push(node.id.clone());
            }
            if node.leaf {
                leaves.push(node.id);
            }
        }

        Ok(Step {
            path: path.to_string(),
            nodes,
            leaves,
        })
    }
}

impl<F> Iterator for Walk<'_, F>
where
    F: Fetch,
{
    type Item = Result<Step, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let path = self.pending.pop()?;
        match self.step(&path) {
            Ok(step) => {
                self.pending.extend(step.nodes.iter().rev().cloned());
                Some(Ok(step))
            }
            Err(err) => {
                self.failed = true;
                self.pending.clear();
                Some(Err(err))
            }
        }
    }
}

impl<F> FusedIterator for Walk<'_, F> where F: Fetch {}
