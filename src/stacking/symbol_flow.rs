//! C3 — Symbol Flow Analyzer: best-effort, extension-driven export/import extraction over every
//! file present at head, producing a file→file import graph used by C4/C5's scoring signals.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use std::sync::LazyLock;

use crate::hash::ObjectHash;
use crate::repository::ObjectStore;
use crate::stacking::errors::StackingError;
use crate::stacking::model::{Delta, FileSymbols, ImportEdge, SymbolIndex};
use crate::stacking::warnings::WarningsBag;

/// Extensions probed, in order, when resolving a relative specifier with no extension of its own.
const CANDIDATE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".d.ts", ".json", ".css",
];

static JS_EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*export\s+(?:default\s+)?(?:async\s+)?(?:function\*?|class|const|let|var)\s+([A-Za-z_$][\w$]*)").unwrap()
});
static JS_EXPORT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*export\s*\{\s*([^}]+)\s*\}").unwrap());
static JS_IMPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+([^'"]*?)\s*from\s*['"]([^'"]+)['"]"#).unwrap()
});
static JS_IMPORT_NAMED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*([^}]+)\s*\}").unwrap());

static PY_DEF_OR_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:def|class)\s+([A-Za-z_][\w]*)").unwrap());
static PY_FROM_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*from\s+(\.+[\w.]*|[\w.]+)\s+import\s+(.+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    JsLike,
    Python,
    Unsupported,
}

fn family_for(path: &Path) -> Family {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ts") | Some("tsx") | Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => {
            Family::JsLike
        }
        Some("py") => Family::Python,
        _ => Family::Unsupported,
    }
}

fn parse_names_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            // `foo as bar` / `foo: bar` import/export aliasing: take the local binding name.
            s.rsplit(" as ")
                .next()
                .unwrap_or(s)
                .trim()
                .trim_start_matches('*')
                .trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_js_like(content: &str) -> FileSymbols {
    let mut exports = BTreeSet::new();
    for cap in JS_EXPORT_DECL.captures_iter(content) {
        exports.insert(cap[1].to_string());
    }
    for cap in JS_EXPORT_LIST.captures_iter(content) {
        exports.extend(parse_names_list(&cap[1]));
    }

    let mut imports = Vec::new();
    for cap in JS_IMPORT_FROM.captures_iter(content) {
        let clause = cap[1].trim();
        let specifier = cap[2].to_string();
        let mut names = BTreeSet::new();
        if let Some(named) = JS_IMPORT_NAMED.captures(clause) {
            names.extend(parse_names_list(&named[1]));
        }
        let default_part = clause.split(['{', ',']).next().unwrap_or("").trim();
        if !default_part.is_empty() && !default_part.starts_with('*') {
            names.insert(default_part.to_string());
        }
        imports.push((specifier, names));
    }

    FileSymbols {
        exports,
        imports: imports
            .into_iter()
            .map(|(specifier, names)| ImportEdge {
                from_path: PathBuf::from(specifier),
                names,
            })
            .collect(),
    }
}

fn parse_python(content: &str) -> FileSymbols {
    let mut exports = BTreeSet::new();
    for cap in PY_DEF_OR_CLASS.captures_iter(content) {
        exports.insert(cap[1].to_string());
    }

    let mut imports = Vec::new();
    for cap in PY_FROM_IMPORT.captures_iter(content) {
        let module = cap[1].to_string();
        let names = parse_names_list(&cap[2]);
        imports.push(ImportEdge {
            from_path: PathBuf::from(module.replace('.', "/")),
            names,
        });
    }

    FileSymbols { exports, imports }
}

/// Resolves a relative specifier (`./x`, `../x/y`) against the importing file's directory, then
/// probes candidate extensions plus an `/index.*` fallback. Returns `None` (discarded) if no
/// in-repo file matches.
fn resolve_relative_specifier(
    importer: &Path,
    specifier: &Path,
    live_paths: &BTreeSet<PathBuf>,
) -> Option<PathBuf> {
    let raw = specifier.to_string_lossy();
    if !(raw.starts_with("./") || raw.starts_with("../")) {
        return None;
    }
    let base_dir = importer.parent().unwrap_or(Path::new(""));
    let joined = base_dir.join(specifier);

    if live_paths.contains(&joined) {
        return Some(joined);
    }
    for ext in CANDIDATE_EXTENSIONS {
        let candidate = PathBuf::from(format!("{}{}", joined.display(), ext));
        if live_paths.contains(&candidate) {
            return Some(candidate);
        }
    }
    for ext in CANDIDATE_EXTENSIONS {
        let candidate = joined.join(format!("index{ext}"));
        if live_paths.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Folds a chronologically-ordered delta list into the final path -> blob id state at head,
/// removing paths that were ultimately deleted or renamed away.
fn live_paths_at_head(deltas: &[Delta]) -> std::collections::BTreeMap<PathBuf, ObjectHash> {
    use crate::stacking::model::ChangeStatus;
    let mut live = std::collections::BTreeMap::new();
    for delta in deltas {
        for change in &delta.changes {
            match change.status {
                ChangeStatus::Deleted => {
                    live.remove(&change.path);
                }
                ChangeStatus::Renamed => {
                    if let Some(old) = &change.old_path {
                        live.remove(old);
                    }
                    if let Some(id) = change.new_blob_id {
                        live.insert(change.path.clone(), id);
                    }
                }
                ChangeStatus::Added | ChangeStatus::Modified => {
                    if let Some(id) = change.new_blob_id {
                        live.insert(change.path.clone(), id);
                    }
                }
            }
        }
    }
    live
}

/// Builds the symbol index for every file alive at head. Parsing runs across a `rayon` thread
/// pool (file-level parallelism, deterministic `BTreeMap` merge) via `spawn_blocking`, since the
/// engine's only suspension points are I/O, not CPU work.
pub async fn analyze_symbols(
    store: &dyn ObjectStore,
    deltas: &[Delta],
    warnings: &mut WarningsBag,
) -> Result<SymbolIndex, StackingError> {
    let live = live_paths_at_head(deltas);
    let live_paths: BTreeSet<PathBuf> = live.keys().cloned().collect();

    let mut files = Vec::with_capacity(live.len());
    for (path, blob_id) in &live {
        if family_for(path) == Family::Unsupported {
            continue;
        }
        let blob = store.read_blob(blob_id).await?;
        files.push((path.clone(), blob.data));
    }

    let live_paths_for_blocking = live_paths.clone();
    let parsed: Vec<(PathBuf, Result<FileSymbols, String>)> =
        tokio::task::spawn_blocking(move || {
            use rayon::prelude::*;
            files
                .into_par_iter()
                .map(|(path, data)| {
                    let record = match std::str::from_utf8(&data) {
                        Err(_) => Err("non-UTF-8 content".to_string()),
                        Ok(text) => Ok(match family_for(&path) {
                            Family::JsLike => parse_js_like(text),
                            Family::Python => parse_python(text),
                            Family::Unsupported => unreachable!(),
                        }),
                    };
                    (path, record)
                })
                .map(|(path, record)| match record {
                    Ok(mut symbols) => {
                        for edge in &mut symbols.imports {
                            if let Some(resolved) = resolve_relative_specifier(
                                &path,
                                &edge.from_path,
                                &live_paths_for_blocking,
                            ) {
                                edge.from_path = resolved;
                            }
                        }
                        symbols
                            .imports
                            .retain(|edge| live_paths_for_blocking.contains(&edge.from_path));
                        (path, Ok(symbols))
                    }
                    Err(reason) => (path, Err(reason)),
                })
                .collect()
        })
        .await
        .map_err(|e| StackingError::Object(crate::errors::GitError::CustomError(e.to_string())))?;

    let mut index = SymbolIndex::new();
    for (path, record) in parsed {
        match record {
            Ok(symbols) => {
                index.insert(path, symbols);
            }
            Err(reason) => {
                warnings.push_parse_ignored(path.display().to_string(), reason);
                index.insert(path, FileSymbols::default());
            }
        }
    }
    // Files with an unrecognized extension still contribute an empty record but remain in the
    // path set, per spec.
    for path in &live_paths {
        index.entry(path.clone()).or_default();
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_exports_and_imports() {
        let content = r#"
import { auth } from './auth';
export const token = 'abc';
export function login() {}
"#;
        let symbols = parse_js_like(content);
        assert!(symbols.exports.contains("token"));
        assert!(symbols.exports.contains("login"));
        assert_eq!(symbols.imports.len(), 1);
        assert!(symbols.imports[0].names.contains("auth"));
    }

    #[test]
    fn resolves_relative_specifier_with_probed_extension() {
        let mut live = BTreeSet::new();
        live.insert(PathBuf::from("src/auth.ts"));
        let resolved = resolve_relative_specifier(
            Path::new("src/ui.ts"),
            Path::new("./auth"),
            &live,
        );
        assert_eq!(resolved, Some(PathBuf::from("src/auth.ts")));
    }

    #[test]
    fn python_extractor_finds_def_and_from_import() {
        let content = "from .auth import login, token\n\ndef handler():\n    pass\n";
        let symbols = parse_python(content);
        assert!(symbols.exports.contains("handler"));
        assert_eq!(symbols.imports.len(), 1);
        assert!(symbols.imports[0].names.contains("login"));
    }
}
