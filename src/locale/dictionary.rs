//! Per-language string dictionaries.
//!
//! Dictionaries are trees keyed by dotted paths: `trip.endRide` lives under
//! the `trip` group. Source files may be nested JSON objects, flat objects
//! with dotted keys, or a mix; both are folded into the same tree on load.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{DEFAULT_LANGUAGE, Language};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum Entry {
    Text(String),
    Group(BTreeMap<String, Entry>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    root: BTreeMap<String, Entry>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object, expanding any dotted keys into groups.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: BTreeMap<String, Entry> =
            serde_json::from_str(json).context("dictionary must be a JSON object of strings")?;

        let mut leaves = Vec::new();
        for (key, entry) in &parsed {
            collect_leaves(key.clone(), entry, &mut leaves);
        }

        let mut dictionary = Self::new();
        for (key, text) in leaves {
            dictionary.insert(&key, text);
        }
        Ok(dictionary)
    }

    /// Inserts `text` at `key`. Returns `false`, leaving the dictionary
    /// unchanged, when the path collides with an existing entry of the
    /// other kind (a string where a group is needed, or vice versa).
    pub fn insert(&mut self, key: &str, text: impl Into<String>) -> bool {
        let segments: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };

        let mut level = &mut self.root;
        for segment in parents {
            let entry = level
                .entry(segment.to_string())
                .or_insert_with(|| Entry::Group(BTreeMap::new()));
            match entry {
                Entry::Group(children) => level = children,
                Entry::Text(_) => {
                    warn!(key, segment = *segment, "Dictionary key shadows a string, skipped");
                    return false;
                }
            }
        }

        if let Some(Entry::Group(_)) = level.get(*last) {
            warn!(key, "Dictionary key names a group, skipped");
            return false;
        }
        level.insert(last.to_string(), Entry::Text(text.into()));
        true
    }

    /// Walks `key` segment by segment. Groups, missing segments, and empty
    /// strings all count as unresolved.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        let mut segments = key.split('.').peekable();
        let mut level = &self.root;

        while let Some(segment) = segments.next() {
            let entry = level.get(segment)?;
            match (entry, segments.peek().is_some()) {
                (Entry::Group(children), true) => level = children,
                (Entry::Text(text), false) if !text.is_empty() => return Some(text.as_str()),
                _ => return None,
            }
        }
        None
    }

    /// Number of strings in the dictionary.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Every string's dotted key, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut leaves = Vec::new();
        for (key, entry) in &self.root {
            collect_leaves(key.clone(), entry, &mut leaves);
        }
        leaves.into_iter().map(|(key, _)| key).collect()
    }
}

fn collect_leaves(prefix: String, entry: &Entry, out: &mut Vec<(String, String)>) {
    match entry {
        Entry::Text(text) => out.push((prefix, text.clone())),
        Entry::Group(children) => {
            for (key, child) in children {
                collect_leaves(format!("{prefix}.{key}"), child, out);
            }
        }
    }
}

/// Dictionaries for every loaded language.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    dictionaries: BTreeMap<Language, Dictionary>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dictionaries compiled into the crate.
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self::new();
        for (language, source) in [
            (Language::En, include_str!("../../locales/en.json")),
            (Language::Am, include_str!("../../locales/am.json")),
            (Language::Or, include_str!("../../locales/or.json")),
        ] {
            let dictionary = Dictionary::from_json(source)
                .with_context(|| format!("built-in {} dictionary", language.as_str()))?;
            catalog.insert(language, dictionary);
        }
        Ok(catalog)
    }

    /// Loads `<code>.json` for each supported language from `dir`. Missing
    /// files are skipped, but the default language must be present.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut catalog = Self::new();

        for language in Language::ALL {
            let path = dir.join(format!("{}.json", language.as_str()));
            if !path.exists() {
                debug!(path = %path.display(), "No dictionary for language");
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read dictionary {}", path.display()))?;
            let dictionary = Dictionary::from_json(&content)
                .with_context(|| format!("invalid dictionary {}", path.display()))?;
            catalog.insert(language, dictionary);
        }

        if catalog.dictionary(DEFAULT_LANGUAGE).is_none() {
            bail!(
                "locales directory {} has no {}.json",
                dir.display(),
                DEFAULT_LANGUAGE.as_str()
            );
        }

        info!(dir = %dir.display(), languages = catalog.dictionaries.len(), "Dictionaries loaded");
        Ok(catalog)
    }

    pub fn insert(&mut self, language: Language, dictionary: Dictionary) {
        debug!(language = language.as_str(), strings = dictionary.len(), "Dictionary registered");
        self.dictionaries.insert(language, dictionary);
    }

    pub fn dictionary(&self, language: Language) -> Option<&Dictionary> {
        self.dictionaries.get(&language)
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.dictionaries.keys().copied()
    }

    /// Keys present in the default language but absent from `language`.
    /// These resolve through the default-language fallback.
    pub fn missing_keys(&self, language: Language) -> Vec<String> {
        let Some(default) = self.dictionary(DEFAULT_LANGUAGE) else {
            return Vec::new();
        };
        let target = self.dictionary(language);
        default
            .keys()
            .into_iter()
            .filter(|key| target.and_then(|d| d.lookup(key)).is_none())
            .collect()
    }
}
