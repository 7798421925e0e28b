//! Runtime settings, read from the environment (and `.env`, loaded by the
//! binary before this runs).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::tariff::Tariff;

pub const DEFAULT_LOG_FILE_PATH: &str = "logs/bisklet.log";
pub const DEFAULT_PREFERENCES_PATH: &str = "bisklet-preferences.json";

#[derive(Debug, Clone)]
pub struct Settings {
    pub log_file_path: PathBuf,
    pub preferences_path: PathBuf,
    /// Directory of `<lang>.json` dictionaries. Built-in dictionaries are
    /// used when unset.
    pub locales_dir: Option<PathBuf>,
    pub tariff: Tariff,
    /// Locale tag reported by the device, used on first run.
    pub device_locale: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let tariff = match var("BISKLET_TARIFF_PATH") {
            Some(path) => load_tariff(&path)?,
            None => {
                debug!("BISKLET_TARIFF_PATH not set, using standard tariff");
                Tariff::default()
            }
        };

        Ok(Self {
            log_file_path: var("LOG_FILE_PATH")
                .unwrap_or_else(|| DEFAULT_LOG_FILE_PATH.to_string())
                .into(),
            preferences_path: var("BISKLET_PREFERENCES_PATH")
                .unwrap_or_else(|| DEFAULT_PREFERENCES_PATH.to_string())
                .into(),
            locales_dir: var("BISKLET_LOCALES_DIR").map(PathBuf::from),
            tariff,
            device_locale: var("BISKLET_DEVICE_LOCALE").or_else(|| var("LANG")),
        })
    }
}

/// Loads a [`Tariff`] from a JSON file. Missing fields take their defaults;
/// negative or non-finite values are rejected.
pub fn load_tariff<P: AsRef<Path>>(path: P) -> Result<Tariff> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tariff file {}", path.display()))?;
    let tariff: Tariff = serde_json::from_str(&content)
        .with_context(|| format!("invalid tariff file {}", path.display()))?;
    tariff
        .validate()
        .with_context(|| format!("rejected tariff file {}", path.display()))?;

    info!(
        path = %path.display(),
        base_fee_etb = tariff.base_fee_etb,
        per_km_rate_etb = tariff.per_km_rate_etb,
        per_minute_rate_etb = tariff.per_minute_rate_etb,
        "Tariff loaded"
    );
    Ok(tariff)
}
