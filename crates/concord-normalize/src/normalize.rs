use serde_json::{Map, Value};

use concord_core::{CanonicalResultRecord, PlatformName, Provenance, CHECKSUM_HEX_LEN};

use crate::digest::sha256_hex;
use crate::error::IngestError;
use crate::shape::{detect_shape, json_type, ReportShape, ShapeKind};

const CHECKSUM_KEYS: [&str; 2] = ["sha256", "checksum"];
const ARCH_KEYS: [&str; 2] = ["architecture", "arch"];
const BUILD_URL_KEYS: [&str; 3] = ["build_url", "run_url", "url"];
const TIMESTAMP_KEYS: [&str; 2] = ["timestamp", "captured_at"];

/// Document-level metadata, used to fill provenance the leaves leave out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    pub platform: Option<String>,
    pub serial: Option<String>,
    pub timestamp: Option<String>,
    pub build_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NormalizedDocument {
    pub platform: PlatformName,
    pub document: String,
    pub shape: ShapeKind,
    pub sha256: String,
    pub meta: DocumentMeta,
    pub records: Vec<CanonicalResultRecord>,
}

/// Parse one platform's document into canonical records.
///
/// `platform` is authoritative: an embedded `platform` field that disagrees is
/// logged and ignored.
pub fn normalize_document(
    platform: &PlatformName,
    document: &str,
    bytes: &[u8],
) -> Result<NormalizedDocument, IngestError> {
    let doc: Value = serde_json::from_slice(bytes)
        .map_err(|e| IngestError::malformed(document, format!("not valid JSON: {e}")))?;
    let meta = document_meta(&doc);
    if let Some(embedded) = meta.platform.as_deref() {
        if embedded != platform.as_str() {
            tracing::warn!(
                document,
                declared = platform.as_str(),
                embedded,
                "embedded platform name differs; using declared"
            );
        }
    }

    let ctx = LeafContext { platform, document, meta: &meta };
    let shape = detect_shape(&doc);
    let (kind, records) = match shape {
        ReportShape::NestedTree(tree) => (ShapeKind::NestedTree, ctx.from_tree(tree)?),
        ReportShape::FlatList(items) => (ShapeKind::FlatList, ctx.from_list(items)?),
        ReportShape::Unknown(reason) => return Err(IngestError::malformed(document, reason)),
    };
    tracing::debug!(
        document,
        platform = platform.as_str(),
        shape = kind.label(),
        records = records.len(),
        "normalized"
    );

    Ok(NormalizedDocument {
        platform: platform.clone(),
        document: document.to_string(),
        shape: kind,
        sha256: sha256_hex(bytes),
        meta,
        records,
    })
}

/// Lower-case and check a checksum. Only length and charset are checked; the
/// value is compared, never interpreted.
pub fn normalize_checksum(raw: &str) -> Result<String, String> {
    let sum = raw.trim().to_ascii_lowercase();
    if sum.len() != CHECKSUM_HEX_LEN {
        return Err(format!(
            "checksum must be {CHECKSUM_HEX_LEN} hex characters, got {}",
            sum.len()
        ));
    }
    if !sum.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("checksum contains non-hex characters".to_string());
    }
    Ok(sum)
}

pub fn document_meta(doc: &Value) -> DocumentMeta {
    let Value::Object(obj) = doc else {
        return DocumentMeta::default();
    };
    DocumentMeta {
        platform: string_field(obj, &["platform"]),
        serial: string_field(obj, &["serial"]),
        timestamp: string_field(obj, &TIMESTAMP_KEYS),
        build_url: string_field(obj, &BUILD_URL_KEYS),
    }
}

struct LeafContext<'a> {
    platform: &'a PlatformName,
    document: &'a str,
    meta: &'a DocumentMeta,
}

impl LeafContext<'_> {
    fn from_tree(
        &self,
        tree: &Map<String, Value>,
    ) -> Result<Vec<CanonicalResultRecord>, IngestError> {
        let mut records = Vec::new();
        for (arch, arch_val) in tree {
            let Value::Object(arch_obj) = arch_val else {
                return Err(IngestError::malformed(
                    self.document,
                    format!(
                        "architecture `{arch}` is a {}, expected an object of suites",
                        json_type(arch_val)
                    ),
                ));
            };
            let suites = match arch_obj.get("suites") {
                Some(Value::Object(s)) => s,
                _ => arch_obj,
            };
            for (suite, leaf) in suites {
                let Value::Object(leaf) = leaf else {
                    tracing::debug!(
                        document = self.document,
                        arch,
                        suite,
                        "skipping non-object entry"
                    );
                    continue;
                };
                if !CHECKSUM_KEYS.iter().any(|k| leaf.contains_key(*k)) {
                    tracing::debug!(document = self.document, arch, suite, "no checksum; skipping");
                    continue;
                }
                records.push(self.record(arch, suite, leaf)?);
            }
        }
        Ok(records)
    }

    fn from_list(&self, items: &[Value]) -> Result<Vec<CanonicalResultRecord>, IngestError> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let Value::Object(obj) = item else {
                    return Err(self.malformed(format!(
                        "results[{i}] is a {}, expected an object",
                        json_type(item)
                    )));
                };
                let arch = string_field(obj, &ARCH_KEYS)
                    .ok_or_else(|| self.malformed(format!("results[{i}] has no architecture")))?;
                let suite = string_field(obj, &["suite"])
                    .ok_or_else(|| self.malformed(format!("results[{i}] has no suite")))?;
                self.record(&arch, &suite, obj)
            })
            .collect()
    }

    fn malformed(&self, reason: impl Into<String>) -> IngestError {
        IngestError::malformed(self.document, reason)
    }

    fn record(
        &self,
        arch: &str,
        suite: &str,
        leaf: &Map<String, Value>,
    ) -> Result<CanonicalResultRecord, IngestError> {
        let raw = string_field(leaf, &CHECKSUM_KEYS)
            .ok_or_else(|| {
                self.malformed(format!("{arch}/{suite}: checksum missing or not a string"))
            })?;
        let checksum = normalize_checksum(&raw)
            .map_err(|e| self.malformed(format!("{arch}/{suite}: {e}")))?;
        if arch.trim().is_empty() || suite.trim().is_empty() {
            return Err(self.malformed("empty architecture or suite name"));
        }
        Ok(CanonicalResultRecord {
            platform: self.platform.clone(),
            architecture: arch.trim().to_string(),
            suite: suite.trim().to_string(),
            checksum,
            claimed_reproducible: bool_field(leaf, "reproducible"),
            provenance: Provenance {
                build_url: string_field(leaf, &BUILD_URL_KEYS)
                    .or_else(|| self.meta.build_url.clone()),
                captured_at: string_field(leaf, &TIMESTAMP_KEYS)
                    .or_else(|| self.meta.timestamp.clone()),
                serial: self.meta.serial.clone(),
                source: Some(self.document.to_string()),
            },
        })
    }
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
