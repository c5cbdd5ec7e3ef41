//! Settings file loading

use anyhow::Context;
use pks_core::StoreSettings;
use std::fs;
use std::path::Path;

/// Read store settings from a TOML file
///
/// A missing `path` yields default settings.
pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<StoreSettings> {
    let Some(path) = path else {
        return Ok(StoreSettings::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: StoreSettings = toml::from_str(&text)
        .with_context(|| format!("invalid settings file {}", path.display()))?;

    tracing::debug!(path = %path.display(), ?settings, "loaded settings");
    Ok(settings)
}

/// Settings file values with command-line flags taking precedence
pub(crate) fn resolve(
    path: Option<&Path>,
    namespace: Option<String>,
    delimiter: Option<String>,
) -> anyhow::Result<StoreSettings> {
    let flags = StoreSettings {
        namespace,
        delimiter,
    };
    Ok(load(path)?.overlay(flags))
}
