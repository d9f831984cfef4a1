//! Extension to category lookup.
//!
//! Presets are flat JSON objects mapping an extension to a folder name:
//!
//! ```json
//! { ".jpg": "Images", "PDF": "Documents" }
//! ```
//!
//! Keys are normalized to lower case without the leading dot. User presets
//! override the defaults key by key.

use crate::paths::StatePaths;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const BUILTIN: &[(&str, &str)] = &[
    ("jpg", "Images"),
    ("jpeg", "Images"),
    ("png", "Images"),
    ("mp4", "Videos"),
    ("mp3", "Audio"),
    ("zip", "Archives"),
    ("pdf", "Documents"),
    ("txt", "Documents"),
];

#[derive(Debug, Clone, Default)]
pub struct Presets {
    by_extension: HashMap<String, String>,
}

impl Presets {
    /// Merges `default_presets.json` and `user_presets.json`. Falls back to a
    /// small built-in table when neither file can be read.
    pub fn load(paths: &StatePaths) -> Self {
        let defaults = read_preset_file(&paths.default_presets);
        let user = read_preset_file(&paths.user_presets);

        if defaults.is_none() && user.is_none() {
            debug!("no preset files, using built-in presets");
            return Self::builtin();
        }

        let mut presets = Self::default();
        for (ext, category) in defaults.into_iter().chain(user).flatten() {
            presets.insert(&ext, &category);
        }
        presets
    }

    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN.iter().copied())
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut presets = Self::default();
        for (ext, category) in pairs {
            presets.insert(ext, category);
        }
        presets
    }

    fn insert(&mut self, ext: &str, category: &str) {
        let key = normalize_extension(ext);
        let category = category.trim();
        if key.is_empty() || category.is_empty() {
            return;
        }
        self.by_extension.insert(key, category.to_string());
    }

    /// Category for the extension of `file`, if one is configured.
    pub fn category_for(&self, file: &Path) -> Option<&str> {
        let ext = file.extension()?.to_string_lossy();
        self.by_extension
            .get(&normalize_extension(&ext))
            .map(String::as_str)
    }

    /// Every configured category, sorted and de-duplicated.
    pub fn categories(&self) -> Vec<&str> {
        self.by_extension
            .values()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

fn read_preset_file(path: &Path) -> Option<HashMap<String, String>> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(map) => Some(map),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed presets");
            None
        }
    }
}
