//! Typed configuration files with per-robot overlays.
//!
//! A configuration consists of a main TOML file, shared by all robots, and an optional overlay
//! file with the same name in a robot-specific directory. Keys in the overlay replace the keys in
//! the main file, tables are merged recursively.
pub mod error;


use std::{fs, path::Path};

use serde::{Serialize, de::DeserializeOwned};
use toml::Table;

pub use error::{Error, Result};

/// A configuration type that is stored as a TOML file.
pub trait Config: Serialize + DeserializeOwned {
    /// File name of the configuration, relative to a config root.
    const PATH: &'static str;

    /// Loads the configuration from `root`.
    fn load(root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join(Self::PATH);
        let table = read_table(&path)?;

        deserialize(table, &path)
    }

    /// Loads the configuration from `root`, with the overlay in `overlay_root` applied on top.
    ///
    /// A missing overlay file is not an error, the main configuration is used as is.
    fn load_with_overlay(root: impl AsRef<Path>, overlay_root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join(Self::PATH);
        let main = read_table(&path)?;

        let overlay_path = overlay_root.as_ref().join(Self::PATH);
        let merged = if overlay_path.exists() {
            merge(main, read_table(&overlay_path)?, false)
        } else {
            main
        };

        deserialize(merged, &path)
    }

    /// Parses the configuration from a TOML string.
    fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|source| Error::Deserialize {
            path: Self::PATH.into(),
            source,
        })
    }

    /// Stores the difference between `self` and `main` as an overlay in `overlay_root`.
    fn save_as_overlay(&self, main: &Self, overlay_root: impl AsRef<Path>) -> Result<()> {
        let changed = Table::try_from(self)?;
        let original = Table::try_from(main)?;
        let diff = extract_diff(&original, &changed);

        let path = overlay_root.as_ref().join(Self::PATH);
        fs::write(&path, toml::to_string_pretty(&diff)?)
            .map_err(|source| Error::Write { path, source })
    }
}

fn read_table(path: &Path) -> Result<Table> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    contents.parse().map_err(|source| Error::Deserialize {
        path: path.to_path_buf(),
        source,
    })
}

fn deserialize<T: DeserializeOwned>(table: Table, path: &Path) -> Result<T> {
    table.try_into().map_err(|source| Error::Deserialize {
        path: path.to_path_buf(),
        source,
    })
}

/// Merges `overlay` into `main`.
///
/// Tables are merged recursively, every other value in the overlay replaces the value in main.
/// Keys that only exist in the overlay are added if `add_key` is set.
#[must_use]
pub fn merge(main: Table, overlay: Table, add_key: bool) -> Table {
    let mut merged = Table::new();

    for (key, value) in &main {
        let value = match (value, overlay.get(key)) {
            (toml::Value::Table(main_table), Some(toml::Value::Table(overlay_table))) => {
                toml::Value::Table(merge(main_table.clone(), overlay_table.clone(), add_key))
            }
            (_, Some(overlay_value)) => overlay_value.clone(),
            (value, None) => value.clone(),
        };

        merged.insert(key.clone(), value);
    }

    if add_key {
        for (key, value) in overlay {
            if !main.contains_key(&key) {
                merged.insert(key, value);
            }
        }
    }

    merged
}

/// Extracts the keys of `changed` that differ from `main`.
#[must_use]
pub fn extract_diff(main: &Table, changed: &Table) -> Table {
    let mut diff = Table::new();

    for (key, value) in changed {
        match (main.get(key), value) {
            (Some(toml::Value::Table(main_table)), toml::Value::Table(changed_table)) => {
                let nested = extract_diff(main_table, changed_table);
                if !nested.is_empty() {
                    diff.insert(key.clone(), toml::Value::Table(nested));
                }
            }
            (Some(main_value), value) if main_value == value => {}
            _ => {
                diff.insert(key.clone(), value.clone());
            }
        }
    }

    diff
}
