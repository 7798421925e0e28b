//! Display-string resolution for the rider and admin apps.
//!
//! Resolution is a pure function of the key, the active language, the
//! loaded [`Catalog`], and an optional literal fallback. It never fails:
//!
//! 1. a key without a `.` is literal text: the fallback if given, else the key;
//! 2. the active language's dictionary;
//! 3. the default language's dictionary;
//! 4. the fallback, else the key's last segment, else the key.
//!
//! [`LocaleContext`] bundles the language and catalog so callers pass one
//! value around instead of reaching for global state.

pub mod dictionary;
pub mod store;

pub use dictionary::{Catalog, Dictionary};
pub use store::{FilePreferenceStore, LANGUAGE_KEY, MemoryPreferenceStore, PreferenceStore};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub const DEFAULT_LANGUAGE: Language = Language::En;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Am,
    Or,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Am, Language::Or];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Am => "am",
            Language::Or => "or",
        }
    }

    /// Name of the language in itself, for the language picker.
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Am => "አማርኛ",
            Language::Or => "Afaan Oromoo",
        }
    }

    /// Parses a language code or a full locale tag (`am-ET`, `or_ET.UTF-8`),
    /// looking only at the language subtag.
    pub fn from_code(code: &str) -> Option<Language> {
        let subtag = code
            .split(['-', '_', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        Language::ALL.into_iter().find(|l| l.as_str() == subtag)
    }

    pub fn direction(&self) -> Direction {
        match self {
            Language::En | Language::Am | Language::Or => Direction::Ltr,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reading direction of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    /// No supported language uses this yet.
    Rtl,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Resolves `key` for `language`. See the module docs for the order.
pub fn resolve<'a>(
    catalog: &'a Catalog,
    language: Language,
    key: &'a str,
    fallback: Option<&'a str>,
) -> &'a str {
    let fallback = fallback.filter(|f| !f.is_empty());

    if !key.contains('.') {
        return fallback.unwrap_or(key);
    }

    let found = catalog
        .dictionary(language)
        .and_then(|d| d.lookup(key))
        .or_else(|| {
            if language == DEFAULT_LANGUAGE {
                return None;
            }
            catalog.dictionary(DEFAULT_LANGUAGE).and_then(|d| d.lookup(key))
        });

    match found {
        Some(text) => text,
        None => {
            debug!(key, language = language.as_str(), "Translation missing");
            fallback
                .or_else(|| key.rsplit('.').next().filter(|s| !s.is_empty()))
                .unwrap_or(key)
        }
    }
}

/// Picks the startup language: a supported saved preference, else a
/// supported device locale, else the default.
pub fn detect_language(saved: Option<&str>, device_locale: Option<&str>) -> Language {
    if let Some(saved) = saved {
        match Language::from_code(saved) {
            Some(language) => return language,
            None => warn!(saved, "Saved language is not supported, ignoring"),
        }
    }
    device_locale
        .and_then(Language::from_code)
        .unwrap_or(DEFAULT_LANGUAGE)
}

pub struct LocaleContext {
    language: Language,
    catalog: Catalog,
}

impl LocaleContext {
    pub fn new(catalog: Catalog, language: Language) -> Self {
        Self { language, catalog }
    }

    /// Builds the context from the saved preference, falling back to the
    /// device locale. A store that cannot be read is treated as empty.
    pub async fn load(
        catalog: Catalog,
        store: &dyn PreferenceStore,
        device_locale: Option<&str>,
    ) -> Self {
        let saved = match store.get(LANGUAGE_KEY).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "Could not read saved language");
                None
            }
        };
        let language = detect_language(saved.as_deref(), device_locale);
        info!(language = language.as_str(), saved = ?saved, device_locale, "Language selected");
        Self::new(catalog, language)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn direction(&self) -> Direction {
        self.language.direction()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn t<'a>(&'a self, key: &'a str) -> &'a str {
        resolve(&self.catalog, self.language, key, None)
    }

    pub fn t_or<'a>(&'a self, key: &'a str, fallback: &'a str) -> &'a str {
        resolve(&self.catalog, self.language, key, Some(fallback))
    }

    /// Switches language and persists the choice. The switch applies even
    /// if persisting fails; the error is returned so the caller can report it.
    pub async fn set_language(
        &mut self,
        language: Language,
        store: &dyn PreferenceStore,
    ) -> Result<Direction> {
        self.language = language;
        info!(language = language.as_str(), direction = language.direction().as_str(), "Language changed");

        store
            .set(LANGUAGE_KEY, language.as_str())
            .await
            .context("failed to persist language preference")?;
        Ok(language.direction())
    }
}
