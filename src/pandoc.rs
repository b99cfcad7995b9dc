//! Pandoc JSON AST support
//!
//! Only the node types the filter reads or produces are typed; everything
//! else travels through [`walk`] as plain `serde_json::Value`.

use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `[identifier, classes, key-value pairs]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr(pub String, pub Vec<String>, pub Vec<(String, String)>);

impl Attr {
    pub fn identifier(&self) -> &str {
        &self.0
    }

    pub fn key_values(&self) -> &[(String, String)] {
        &self.2
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.1.iter().any(|c| c == class)
    }
}

/// Content of a `CodeBlock` node: attributes and the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock(pub Attr, pub String);

impl CodeBlock {
    pub fn attr(&self) -> &Attr {
        &self.0
    }

    pub fn text(&self) -> &str {
        &self.1
    }
}

/// `[url, title]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target(pub String, pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "c")]
pub enum Inline {
    Str(String),
    Image(Attr, Vec<Inline>, Target),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "c")]
pub enum Block {
    Para(Vec<Inline>),
}

/// Split the `caption` attribute off a key-value list.
///
/// Every `caption` pair is removed; if several are present the last one wins.
pub fn extract_caption(key_values: &[(String, String)]) -> (Option<String>, Vec<(String, String)>) {
    let mut caption = None;
    let mut rest = Vec::with_capacity(key_values.len());
    for (key, value) in key_values {
        if key == "caption" {
            caption = Some(value.clone());
        } else {
            rest.push((key.clone(), value.clone()));
        }
    }
    (caption, rest)
}

/// A per-node action driven by [`walk`].
pub trait NodeFilter {
    /// Inspect one node (`{"t": kind, "c": content}`).
    ///
    /// `Ok(None)` leaves the node as it is; `Ok(Some(nodes))` splices `nodes`
    /// into the enclosing list in its place.
    fn apply(
        &self,
        kind: &str,
        content: &Value,
        target: &str,
        meta: &Value,
    ) -> Result<Option<Vec<Value>>, FilterError>;
}

/// Apply `filter` to every node in `value`, depth first.
pub fn walk<F>(value: Value, filter: &F, target: &str, meta: &Value) -> Result<Value, FilterError>
where
    F: NodeFilter + ?Sized,
{
    match value {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let replacement = match node_kind(&item) {
                    Some((kind, content)) => filter.apply(kind, content, target, meta)?,
                    None => None,
                };
                match replacement {
                    None => out.push(walk(item, filter, target, meta)?),
                    Some(nodes) => {
                        for node in nodes {
                            out.push(walk(node, filter, target, meta)?);
                        }
                    }
                }
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                out.insert(key, walk(child, filter, target, meta)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other),
    }
}

fn node_kind(value: &Value) -> Option<(&str, &Value)> {
    let object = value.as_object()?;
    let kind = object.get("t")?.as_str()?;
    Some((kind, object.get("c").unwrap_or(&Value::Null)))
}

/// Run `filter` over a whole pandoc document.
///
/// Accepts the current `{"pandoc-api-version", "meta", "blocks"}` shape and
/// the legacy `[{"unMeta": ..}, [blocks]]` shape.
pub fn filter_document<F>(doc: Value, filter: &F, target: &str) -> Result<Value, FilterError>
where
    F: NodeFilter + ?Sized,
{
    let meta = document_meta(&doc)?;
    walk(doc, filter, target, &meta)
}

fn document_meta(doc: &Value) -> Result<Value, FilterError> {
    let empty = || Value::Object(Map::new());
    match doc {
        Value::Object(map) => {
            if !map.get("blocks").is_some_and(Value::is_array) {
                return Err(FilterError::Document("expected a \"blocks\" array".to_string()));
            }
            Ok(map.get("meta").cloned().unwrap_or_else(empty))
        }
        Value::Array(parts) => match parts.as_slice() {
            [Value::Object(head), Value::Array(_)] => match head.get("unMeta") {
                Some(meta) => Ok(meta.clone()),
                None => Err(FilterError::Document("legacy document without \"unMeta\"".to_string())),
            },
            _ => Err(FilterError::Document(
                "expected a legacy [{\"unMeta\": ..}, [blocks]] document".to_string(),
            )),
        },
        _ => Err(FilterError::Document(
            "expected a pandoc JSON document (run pandoc with --filter or -t json)".to_string(),
        )),
    }
}
