//! The Graphite metrics API
//!
//! `find` lists the nodes matching a query, `expand` resolves a query to the
//! metric paths it matches and `index.json` lists every metric the host
//! knows about.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{
    Error,
    http::{Fetch, Response},
    reader::RequestContext,
};

/// Path of the find endpoint
pub const FIND_PATH: &str = "/metrics/find";
/// Path of the expand endpoint
pub const EXPAND_PATH: &str = "/metrics/expand";
/// Path of the index endpoint
pub const INDEX_PATH: &str = "/metrics/index.json";

/// A node of the metric tree, as returned by `find`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Node {
    /// Full dotted path of the node
    pub id: String,
    /// Last path component, for display
    #[serde(default)]
    pub text: Option<String>,
    /// Whether the node holds data
    #[serde(deserialize_with = "flag")]
    pub leaf: bool,
    /// Whether the node has children
    #[serde(rename = "allowChildren", deserialize_with = "flag")]
    pub allow_children: bool,
}

/// Graphite sends node flags as `0`/`1`, some proxies as booleans.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n == 1,
    })
}

/// The result of an `expand` request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Expansion {
    /// Every matching path
    Paths(Vec<String>),
    /// Matching paths grouped by the expression that matched them
    Grouped(BTreeMap<String, Vec<String>>),
}

/// Client for the metrics API of one Graphite host
#[derive(Debug)]
pub struct MetricsApi<'a, F> {
    context: &'a RequestContext<F>,
}

impl<'a, F> MetricsApi<'a, F>
where
    F: Fetch,
{
    pub(crate) fn new(context: &'a RequestContext<F>) -> Self {
        Self { context }
    }

    /// List the nodes matching `query`.
    ///
    /// # Errors
    ///
    /// Function will return an error if the request fails, the body is not
    /// a JSON array, or a node lacks `id`, `leaf` or `allowChildren`.
    pub fn find(
        &self,
        query: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Vec<Node>, Error> {
        let params = [
            ("query", Some(query.to_string())),
            ("formater", Some("treejson".to_string())),
            ("from", start.map(str::to_string)),
            ("until", end.map(str::to_string)),
            ("wildcards", Some("0".to_string())),
        ];
        let response = self.context.get(FIND_PATH, &params)?;
        let nodes: Vec<Value> = decode(&response)?;
        nodes
            .into_iter()
            .map(|node| {
                serde_json::from_value(node).map_err(|e| Error::MalformedFormat(e.to_string()))
            })
            .collect()
    }

    /// Resolve `query` to the metric paths it matches.
    ///
    /// With `group_by_expr` the paths are grouped by the expression that
    /// matched them. With `leaves_only` only paths holding data are
    /// returned.
    ///
    /// # Errors
    ///
    /// Function will return an error if the request fails or the body has
    /// no `results` of the expected shape.
    pub fn expand(
        &self,
        query: &str,
        group_by_expr: bool,
        leaves_only: bool,
    ) -> Result<Expansion, Error> {
        let params = [
            ("query", Some(query.to_string())),
            ("groupByExpr", Some(u8::from(group_by_expr).to_string())),
            ("leavesOnly", Some(u8::from(leaves_only).to_string())),
        ];
        let response = self.context.get(EXPAND_PATH, &params)?;
        let mut body: Value = decode(&response)?;
        let results = body
            .get_mut("results")
            .map(Value::take)
            .ok_or_else(|| Error::MalformedFormat("expand response without results".to_string()))?;
        serde_json::from_value(results).map_err(|e| Error::MalformedFormat(e.to_string()))
    }

    /// List every metric the host knows about, sorted.
    ///
    /// # Errors
    ///
    /// Function will return an error if the request fails or the body is not
    /// a JSON array of strings.
    pub fn index(&self) -> Result<Vec<String>, Error> {
        let response = self.context.get(INDEX_PATH, &[])?;
        decode(&response)
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: &Response) -> Result<T, Error> {
    response.json().map_err(|source| Error::Decode {
        url: response.url.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::testing::ScriptedFetch;

    fn context(fetch: &ScriptedFetch) -> RequestContext<&ScriptedFetch> {
        RequestContext::with_fetch("https://graphite.example.net/", fetch).unwrap()
    }

    #[test]
    fn find_accepts_numeric_and_boolean_flags() {
        let fetch = ScriptedFetch::new().respond(
            200,
            r#"[
                {"id": "a.b", "text": "b", "leaf": 0, "allowChildren": 1, "expandable": 1},
                {"id": "a.c", "text": "c", "leaf": true, "allowChildren": false}
            ]"#,
        );
        let context = context(&fetch);
        let nodes = MetricsApi::new(&context).find("a.*", None, Some("now")).unwrap();
        assert_eq!(
            nodes,
            vec![
                Node {
                    id: "a.b".to_string(),
                    text: Some("b".to_string()),
                    leaf: false,
                    allow_children: true,
                },
                Node {
                    id: "a.c".to_string(),
                    text: Some("c".to_string()),
                    leaf: true,
                    allow_children: false,
                },
            ]
        );

        let calls = fetch.calls();
        assert_eq!(calls[0].0, "https://graphite.example.net/metrics/find");
        assert_eq!(
            calls[0].1,
            vec![
                ("query".to_string(), Some("a.*".to_string())),
                ("formater".to_string(), Some("treejson".to_string())),
                ("from".to_string(), None),
                ("until".to_string(), Some("now".to_string())),
                ("wildcards".to_string(), Some("0".to_string())),
            ]
        );
    }

    #[test]
    fn find_rejects_nodes_without_flags() {
        let fetch = ScriptedFetch::new().respond(200, r#"[{"id": "a.b", "text": "b"}]"#);
        let context = context(&fetch);
        let err = MetricsApi::new(&context).find("a.*", None, None).unwrap_err();
        assert!(matches!(err, Error::MalformedFormat(_)));
    }

    #[test]
    fn expand_returns_paths() {
        let fetch = ScriptedFetch::new().respond(200, r#"{"results": ["a.b", "a.c"]}"#);
        let context = context(&fetch);
        let expansion = MetricsApi::new(&context).expand("a.*", false, true).unwrap();
        assert_eq!(
            expansion,
            Expansion::Paths(vec!["a.b".to_string(), "a.c".to_string()])
        );
        assert_eq!(
            fetch.calls()[0].1,
            vec![
                ("query".to_string(), Some("a.*".to_string())),
                ("groupByExpr".to_string(), Some("0".to_string())),
                ("leavesOnly".to_string(), Some("1".to_string())),
            ]
        );
    }

    #[test]
    fn expand_groups_by_expression() {
        let fetch =
            ScriptedFetch::new().respond(200, r#"{"results": {"a.*": ["a.b"], "c.*": []}}"#);
        let context = context(&fetch);
        let expansion = MetricsApi::new(&context).expand("a.*", true, false).unwrap();
        let Expansion::Grouped(groups) = expansion else {
            panic!("expected grouped expansion");
        };
        assert_eq!(groups["a.*"], vec!["a.b".to_string()]);
        assert!(groups["c.*"].is_empty());
    }

    #[test]
    fn expand_without_results_is_malformed() {
        let fetch = ScriptedFetch::new().respond(200, r#"{"paths": []}"#);
        let context = context(&fetch);
        let err = MetricsApi::new(&context).expand("a.*", false, false).unwrap_err();
        assert!(matches!(err, Error::MalformedFormat(_)));
    }

    #[test]
    fn index_lists_metrics() {
        let fetch = ScriptedFetch::new().respond(200, r#"["a.b", "a.c", "d"]"#);
        let context = context(&fetch);
        let index = MetricsApi::new(&context).index().unwrap();
        assert_eq!(index, vec!["a.b", "a.c", "d"]);
        assert_eq!(
            fetch.calls()[0].0,
            "https://graphite.example.net/metrics/index.json"
        );
    }
}
