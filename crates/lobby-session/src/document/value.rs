/// Tagged-variant settings tree carried by the replicated document.
///
/// Subtrees (`game`, `options`, `server`, most of `system`) are opaque
/// to the protocol — the core only merges and replaces them. Deltas use
/// the reserved `"#empty#"` text value to delete a field on merge.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::DELETE_SENTINEL;

/// One node of a settings tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsValue {
    Map(BTreeMap<String, SettingsValue>),
    List(Vec<SettingsValue>),
    Text(String),
    Uint(u64),
}

impl SettingsValue {
    /// An empty map node.
    pub fn map() -> Self {
        SettingsValue::Map(BTreeMap::new())
    }

    /// Whether this value is the reserved delete sentinel.
    pub fn is_delete_sentinel(&self) -> bool {
        matches!(self, SettingsValue::Text(s) if s == DELETE_SENTINEL)
    }

    /// Look up a value by slash-separated path (e.g. `"system/lock"`).
    pub fn get(&self, path: &str) -> Option<&SettingsValue> {
        let mut node = self;
        for segment in path.split('/') {
            match node {
                SettingsValue::Map(map) => node = map.get(segment)?,
                _ => return None,
            }
        }
        Some(node)
    }

    /// Look up a text value by path; `None` when missing or not text.
    pub fn get_text(&self, path: &str) -> Option<&str> {
        match self.get(path)? {
            SettingsValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Look up an unsigned value by path.
    pub fn get_uint(&self, path: &str) -> Option<u64> {
        match self.get(path)? {
            SettingsValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Set a value at a slash-separated path, creating intermediate
    /// maps. Replaces non-map intermediates with maps.
    pub fn set(&mut self, path: &str, value: SettingsValue) {
        let mut node = self;
        let mut segments = path.split('/').peekable();
        while let Some(segment) = segments.next() {
            if !matches!(node, SettingsValue::Map(_)) {
                *node = SettingsValue::map();
            }
            let SettingsValue::Map(map) = node else {
                unreachable!()
            };
            if segments.peek().is_none() {
                map.insert(segment.to_string(), value);
                return;
            }
            node = map
                .entry(segment.to_string())
                .or_insert_with(SettingsValue::map);
        }
    }

    /// Remove the value at a path. Returns the removed value, if any.
    pub fn remove(&mut self, path: &str) -> Option<SettingsValue> {
        let (parent_path, key) = match path.rsplit_once('/') {
            Some((p, k)) => (Some(p), k),
            None => (None, path),
        };
        let parent = match parent_path {
            Some(p) => self.get_mut_path(p)?,
            None => self,
        };
        match parent {
            SettingsValue::Map(map) => map.remove(key),
            _ => None,
        }
    }

    fn get_mut_path(&mut self, path: &str) -> Option<&mut SettingsValue> {
        let mut node = self;
        for segment in path.split('/') {
            match node {
                SettingsValue::Map(map) => node = map.get_mut(segment)?,
                _ => return None,
            }
        }
        Some(node)
    }

    /// Recursively overlay a partial tree onto this one.
    ///
    /// Map-onto-map merges key by key; any other combination replaces
    /// the target wholesale. A delete-sentinel value removes the key.
    /// Idempotent: merging a delta the tree already reflects is a no-op.
    pub fn merge_update(&mut self, delta: &SettingsValue) {
        match (self, delta) {
            (SettingsValue::Map(target), SettingsValue::Map(overlay)) => {
                for (key, value) in overlay {
                    if value.is_delete_sentinel() {
                        target.remove(key);
                        continue;
                    }
                    let mergeable = matches!(
                        (target.get(key), value),
                        (Some(SettingsValue::Map(_)), SettingsValue::Map(_))
                    );
                    if mergeable {
                        if let Some(existing) = target.get_mut(key) {
                            existing.merge_update(value);
                        }
                    } else {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
            (target, delta) => *target = delta.clone(),
        }
    }

    /// Remove every listed path from the tree.
    pub fn merge_delete(&mut self, paths: &[String]) {
        for path in paths {
            self.remove(path);
        }
    }
}

impl From<&str> for SettingsValue {
    fn from(s: &str) -> Self {
        SettingsValue::Text(s.to_string())
    }
}

impl From<String> for SettingsValue {
    fn from(s: String) -> Self {
        SettingsValue::Text(s)
    }
}

impl From<u64> for SettingsValue {
    fn from(v: u64) -> Self {
        SettingsValue::Uint(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SettingsValue {
        let mut root = SettingsValue::map();
        root.set("system/network", "live".into());
        root.set("system/access", "public".into());
        root.set("game/mode", "coop".into());
        root.set("game/difficulty", SettingsValue::Uint(2));
        root
    }

    #[test]
    fn path_lookup() {
        let root = sample();
        assert_eq!(root.get_text("system/network"), Some("live"));
        assert_eq!(root.get_uint("game/difficulty"), Some(2));
        assert_eq!(root.get("missing/path"), None);
        assert_eq!(root.get_text("game/difficulty"), None);
    }

    #[test]
    fn set_creates_intermediates() {
        let mut root = SettingsValue::map();
        root.set("a/b/c", SettingsValue::Uint(1));
        assert_eq!(root.get_uint("a/b/c"), Some(1));
    }

    #[test]
    fn remove_by_path() {
        let mut root = sample();
        assert!(root.remove("game/mode").is_some());
        assert_eq!(root.get("game/mode"), None);
        assert!(root.remove("game/mode").is_none());
        assert_eq!(root.get_uint("game/difficulty"), Some(2));
    }

    #[test]
    fn merge_overlays_maps() {
        let mut root = sample();
        let mut delta = SettingsValue::map();
        delta.set("system/access", "private".into());
        delta.set("game/round", SettingsValue::Uint(3));
        root.merge_update(&delta);

        assert_eq!(root.get_text("system/access"), Some("private"));
        assert_eq!(root.get_uint("game/round"), Some(3));
        // Untouched siblings survive.
        assert_eq!(root.get_text("system/network"), Some("live"));
        assert_eq!(root.get_text("game/mode"), Some("coop"));
    }

    #[test]
    fn merge_sentinel_deletes() {
        let mut root = sample();
        let mut delta = SettingsValue::map();
        delta.set("game/mode", DELETE_SENTINEL.into());
        root.merge_update(&delta);
        assert_eq!(root.get("game/mode"), None);
        assert_eq!(root.get_uint("game/difficulty"), Some(2));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut root = sample();
        let mut delta = SettingsValue::map();
        delta.set("system/lock", "starting".into());
        delta.set("game/mode", DELETE_SENTINEL.into());

        root.merge_update(&delta);
        let once = root.clone();
        root.merge_update(&delta);
        assert_eq!(root, once);
    }

    #[test]
    fn merge_scalar_replaces_subtree() {
        let mut root = sample();
        let mut delta = SettingsValue::map();
        delta.set("game", "reset".into());
        root.merge_update(&delta);
        assert_eq!(root.get_text("game"), Some("reset"));
    }

    #[test]
    fn merge_delete_paths() {
        let mut root = sample();
        root.merge_delete(&["system/access".into(), "game/difficulty".into()]);
        assert_eq!(root.get("system/access"), None);
        assert_eq!(root.get("game/difficulty"), None);
        assert_eq!(root.get_text("system/network"), Some("live"));
    }

    #[test]
    fn value_roundtrip() {
        let root = sample();
        let bytes = rmp_serde::to_vec(&root).expect("serialize");
        let decoded: SettingsValue = rmp_serde::from_slice(&bytes).expect("deserialize");
        assert_eq!(root, decoded);
    }
}
