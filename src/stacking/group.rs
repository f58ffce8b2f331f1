//! Layer classification used by the `layer_bonus` scoring term in C4/C5, and the shared scoring
//! context both phases build their signals against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::stacking::model::{Delta, FileSymbols, Group, SymbolIndex};

/// Rule-based classification of a path's architectural layer, in a fixed total order used both
/// for the `layer_bonus` term and to break "adjacent layer" ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Schema,
    Codegen,
    Refactor,
    Core,
    Integration,
    Ui,
    Test,
    Unknown,
}

impl Layer {
    /// Whether `self` and `other` sit next to each other in the fixed ordering.
    pub fn is_adjacent(self, other: Layer) -> bool {
        (self as i32 - other as i32).abs() == 1
    }
}

/// Classifies a single path (and, best-effort, its parsed symbols) into a layer.
pub fn classify_layer(path: &Path, symbols: Option<&FileSymbols>) -> Layer {
    let text = path.to_string_lossy().to_lowercase();

    if text.contains("/schema") || text.contains("schema.") || text.ends_with(".proto") {
        return Layer::Schema;
    }
    if text.contains("codegen") || text.contains("generated") || text.contains(".gen.") {
        return Layer::Codegen;
    }
    if text.contains("/test") || text.contains("__tests__") || text.contains(".test.")
        || text.contains(".spec.")
    {
        return Layer::Test;
    }
    if text.contains("/ui/") || text.contains("/components/") || text.contains("/views/")
        || path.extension().and_then(|e| e.to_str()) == Some("tsx")
    {
        return Layer::Ui;
    }
    if text.contains("/integration") || text.contains("/api/") || text.contains("/routes/") {
        return Layer::Integration;
    }
    if text.contains("/refactor") {
        return Layer::Refactor;
    }
    if text.contains("/core/") || text.contains("/lib/") || text.contains("/src/") {
        return Layer::Core;
    }
    if let Some(symbols) = symbols {
        if !symbols.exports.is_empty() && symbols.imports.is_empty() {
            return Layer::Core;
        }
    }
    Layer::Unknown
}

/// A group's dominant layer: the most common classification among its current files, ties
/// broken by the fixed `Layer` order (earliest wins).
pub fn dominant_layer(group: &Group, symbol_index: &SymbolIndex) -> Layer {
    let mut counts: BTreeMap<Layer, usize> = BTreeMap::new();
    for path in &group.files {
        let layer = classify_layer(path, symbol_index.get(path));
        *counts.entry(layer).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(layer, _)| layer)
        .unwrap_or(Layer::Unknown)
}

/// Pairwise co-change counts derived from the per-commit file sets in `deltas`: how many commits
/// touched both `a` and `b`.
pub fn cochange_counts(deltas: &[Delta]) -> BTreeMap<(PathBuf, PathBuf), u32> {
    let mut counts = BTreeMap::new();
    for delta in deltas {
        let mut paths: Vec<&PathBuf> = delta.changes.iter().map(|c| &c.path).collect();
        paths.sort();
        paths.dedup();
        for i in 0..paths.len() {
            for j in (i + 1)..paths.len() {
                let key = (paths[i].clone(), paths[j].clone());
                *counts.entry(key).or_insert(0) += 1;
            }
        }
    }
    counts
}

pub(crate) fn ordered_pair(a: &Path, b: &Path) -> (PathBuf, PathBuf) {
    if a <= b {
        (a.to_path_buf(), b.to_path_buf())
    } else {
        (b.to_path_buf(), a.to_path_buf())
    }
}

/// Read-only context every scoring signal is evaluated against.
pub struct ScoringContext<'a> {
    pub symbol_index: &'a SymbolIndex,
    pub cochange: &'a BTreeMap<(PathBuf, PathBuf), u32>,
    pub total_commits: usize,
}

impl<'a> ScoringContext<'a> {
    pub fn cochange_count(&self, a: &Path, b: &Path) -> u32 {
        self.cochange.get(&ordered_pair(a, b)).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn classifies_ui_and_test_paths() {
        assert_eq!(classify_layer(Path::new("src/ui/button.tsx"), None), Layer::Ui);
        assert_eq!(
            classify_layer(Path::new("src/auth/__tests__/login.test.ts"), None),
            Layer::Test
        );
    }

    #[test]
    fn adjacent_layers_detected() {
        assert!(Layer::Schema.is_adjacent(Layer::Codegen));
        assert!(!Layer::Schema.is_adjacent(Layer::Ui));
    }

    #[test]
    fn cochange_counts_symmetric_lookup() {
        let deltas = vec![Delta {
            sha: crate::hash::ObjectHash::new(b"x"),
            date: 1,
            changes: vec![
                crate::stacking::model::FileChange {
                    path: PathBuf::from("a.ts"),
                    old_path: None,
                    status: crate::stacking::model::ChangeStatus::Modified,
                    new_blob_id: None,
                    new_mode: None,
                    old_blob_id: None,
                },
                crate::stacking::model::FileChange {
                    path: PathBuf::from("b.ts"),
                    old_path: None,
                    status: crate::stacking::model::ChangeStatus::Modified,
                    new_blob_id: None,
                    new_mode: None,
                    old_blob_id: None,
                },
            ],
        }];
        let counts = cochange_counts(&deltas);
        let ctx = ScoringContext {
            symbol_index: &SymbolIndex::new(),
            cochange: &counts,
            total_commits: 1,
        };
        assert_eq!(ctx.cochange_count(Path::new("b.ts"), Path::new("a.ts")), 1);
    }
}
