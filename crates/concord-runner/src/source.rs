use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use concord_core::PlatformName;

const SIDECAR_SUFFIX: &str = ".meta.json";

/// One report document in the working directory, paired with the platform it
/// came from. The normalizer only ever sees these explicit pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDocument {
    pub platform: PlatformName,
    pub path: PathBuf,
    pub name: String,
    /// Serial declared out-of-band by a sidecar, if any.
    pub declared_serial: Option<String>,
    /// Run serial, when the file name carried it as a suffix.
    pub name_serial: Option<String>,
}

impl SourceDocument {
    /// The serial this document vouches for outside its own body: sidecar
    /// first, then the file name.
    pub fn external_serial(&self) -> Option<&str> {
        self.declared_serial.as_deref().or(self.name_serial.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct Sidecar {
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    serial: Option<String>,
}

/// List `*.json` report documents in `dir`, sorted by file name.
///
/// Platform names come from, in order: a `<stem>.meta.json` sidecar, the file
/// name with a trailing `-<serial>` removed (when `serial` is known), the bare
/// file stem. Sidecars and any path in `exclude` are never listed.
pub fn list_sources(
    dir: &Path,
    serial: Option<&str>,
    exclude: &[PathBuf],
) -> Result<Vec<SourceDocument>> {
    if !dir.is_dir() {
        return Err(anyhow!("input directory {} does not exist", dir.display()));
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(".json") || name.ends_with(SIDECAR_SUFFIX) {
            continue;
        }
        let path = entry.path();
        if exclude.iter().any(|x| same_file(x, &path)) {
            continue;
        }
        names.push((name, path));
    }
    names.sort();

    let mut docs = Vec::with_capacity(names.len());
    for (name, path) in names {
        let stem = name.trim_end_matches(".json").to_string();
        let sidecar = read_sidecar(dir, &stem);
        let declared_serial = sidecar.as_ref().and_then(|s| s.serial.clone());
        let stripped = strip_serial(&stem, serial);
        let name_serial = stripped.and(serial).map(str::to_string);
        let platform = sidecar
            .and_then(|s| s.platform)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| stripped.unwrap_or(&stem).to_string());
        if platform.is_empty() {
            tracing::warn!(file = %path.display(), "cannot derive a platform name; skipping");
            continue;
        }
        docs.push(SourceDocument {
            platform: PlatformName::from_str(platform),
            path,
            name,
            declared_serial,
            name_serial,
        });
    }
    Ok(docs)
}

/// `github-20261016.json` with serial `20261016` -> `github`.
pub fn platform_from_stem(stem: &str, serial: Option<&str>) -> String {
    strip_serial(stem, serial).unwrap_or(stem).to_string()
}

/// The platform part of `stem` when it ends in `-<serial>` or `_<serial>`.
fn strip_serial<'a>(stem: &'a str, serial: Option<&str>) -> Option<&'a str> {
    let serial = serial.filter(|s| !s.is_empty())?;
    ['-', '_'].into_iter().find_map(|sep| {
        stem.strip_suffix(&format!("{sep}{serial}"))
            .filter(|head| !head.is_empty())
    })
}

fn read_sidecar(dir: &Path, stem: &str) -> Option<Sidecar> {
    let path = dir.join(format!("{stem}{SIDECAR_SUFFIX}"));
    if !path.exists() {
        return None;
    }
    let parsed = std::fs::read(&path)
        .map_err(anyhow::Error::from)
        .and_then(|b| serde_json::from_slice::<Sidecar>(&b).map_err(anyhow::Error::from));
    match parsed {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(
                file = %path.display(),
                error = %e,
                "unreadable sidecar; falling back to file name"
            );
            None
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}
