use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which recognized layout a document used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    NestedTree,
    FlatList,
}

impl ShapeKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NestedTree => "nested_tree",
            Self::FlatList => "flat_list",
        }
    }
}

/// Structural match of a parsed document against the known layouts.
#[derive(Debug)]
pub enum ReportShape<'a> {
    /// `{"architectures": {"<arch>": {"<suite>": {"sha256": ...}}}}`, optionally
    /// with a `suites` wrapper per architecture. `results` is accepted in place
    /// of `architectures`.
    NestedTree(&'a Map<String, Value>),
    /// `[{"architecture", "suite", "sha256"}, ...]`, either bare or under a
    /// top-level `results` key.
    FlatList(&'a [Value]),
    Unknown(String),
}

impl ReportShape<'_> {
    pub fn kind(&self) -> Option<ShapeKind> {
        match self {
            Self::NestedTree(_) => Some(ShapeKind::NestedTree),
            Self::FlatList(_) => Some(ShapeKind::FlatList),
            Self::Unknown(_) => None,
        }
    }
}

const TREE_KEYS: [&str; 2] = ["architectures", "results"];

/// Try each known shape in a fixed priority order: nested tree first, then
/// flat list.
pub fn detect_shape(doc: &Value) -> ReportShape<'_> {
    match doc {
        Value::Object(obj) => {
            for key in TREE_KEYS {
                if let Some(Value::Object(tree)) = obj.get(key) {
                    return ReportShape::NestedTree(tree);
                }
            }
            if let Some(Value::Array(items)) = obj.get("results") {
                return ReportShape::FlatList(items);
            }
            ReportShape::Unknown(format!(
                "object has neither an `architectures`/`results` tree \
                 nor a `results` array (keys: {})",
                obj.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        }
        Value::Array(items) => ReportShape::FlatList(items),
        other => ReportShape::Unknown(format!("top-level {} is not a report", json_type(other))),
    }
}

pub(crate) fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
