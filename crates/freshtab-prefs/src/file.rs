//! TOML persistence for the pref store.
//!
//! Prefs are flat `key = value` pairs; dotted keys are quoted in TOML
//! (`"newtab.enabled" = true`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use freshtab_common::PrefsError;
use tracing::info;

use crate::store::{PrefStore, PrefValue};

/// Platform-specific default pref file path.
///
/// On macOS: `~/Library/Application Support/freshtab/prefs.toml`
/// On Linux: `~/.config/freshtab/prefs.toml`
pub fn default_prefs_path() -> Result<PathBuf, PrefsError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| PrefsError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("freshtab").join("prefs.toml"))
}

/// Load pref values from a TOML file. Missing keys keep their defaults;
/// keys the subsystem does not track are loaded anyway and simply unused.
pub fn load_from_path(path: &Path) -> Result<HashMap<String, PrefValue>, PrefsError> {
    if !path.exists() {
        return Err(PrefsError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| PrefsError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let values: HashMap<String, PrefValue> = toml::from_str(&content)
        .map_err(|e| PrefsError::ParseError(format!("failed to parse TOML: {e}")))?;

    info!("loaded {} prefs from {}", values.len(), path.display());
    Ok(values)
}

/// Save the store's current values to a TOML file, creating parent
/// directories as needed.
pub fn save_to_path(store: &PrefStore, path: &Path) -> Result<(), PrefsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            PrefsError::WriteError(format!(
                "failed to create pref directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let snapshot = store.snapshot();
    let content = toml::to_string_pretty(&snapshot)
        .map_err(|e| PrefsError::WriteError(format!("failed to serialize prefs: {e}")))?;

    std::fs::write(path, content)
        .map_err(|e| PrefsError::WriteError(format!("failed to write {}: {e}", path.display())))?;

    info!("saved prefs to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;

    #[test]
    fn load_missing_file_is_file_not_found() {
        let err = load_from_path(Path::new("/tmp/nonexistent_freshtab_prefs.toml")).unwrap_err();
        assert!(matches!(err, PrefsError::FileNotFound(_)));
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");

        let store = PrefStore::with_defaults();
        store.set(keys::ROWS, 4i64);
        store.set(keys::SELECTED_LOCALE, "de");
        save_to_path(&store, &path).unwrap();

        let values = load_from_path(&path).unwrap();
        assert_eq!(values.get(keys::ROWS), Some(&PrefValue::Int(4)));
        assert_eq!(
            values.get(keys::SELECTED_LOCALE),
            Some(&PrefValue::Str("de".into()))
        );
        assert_eq!(values.get(keys::ENABLED), Some(&PrefValue::Bool(true)));
    }

    #[test]
    fn load_parses_quoted_dotted_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(
            &path,
            "\"newtab.enabled\" = false\n\"newtab.rows\" = 2\n\"locale.selected\" = \"fr\"\n",
        )
        .unwrap();

        let values = load_from_path(&path).unwrap();
        assert_eq!(values.get(keys::ENABLED), Some(&PrefValue::Bool(false)));
        assert_eq!(values.get(keys::ROWS), Some(&PrefValue::Int(2)));
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "not [ valid toml").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, PrefsError::ParseError(_)));
    }
}
