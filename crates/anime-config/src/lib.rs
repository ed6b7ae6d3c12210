#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! JSON config-file store: a single `./config/config.json` document holding one
//! top-level key per module (`program`, `downloader`, `rss_parser`, `rename`, `proxy`,
//! `notification`, ...).
//!
//! Sections are registered lazily: the first caller to ask for a section via
//! [`ConfigStore::get_or_default`] gets either the stored value (merged with that
//! section's defaults, so upgrading the binary never loses a field) or, if the section
//! is entirely absent, the section's defaults — which are immediately persisted so the
//! file documents what the running instance actually uses. Save preserves insertion
//! order and leaves unrecognized top-level keys untouched.

pub mod error;
pub mod model;
pub mod validate;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info};

pub use error::{ConfigError, ConfigResult};
pub use model::{
    DownloaderConfig, DownloaderType, Language, NotificationConfig, NotificationKind,
    ProgramConfig, ProxyConfig, ProxyKind, RenameConfig, RenameMethod, RssParserConfig,
};

/// Canonical section name for [`RenameConfig`]. The source calls this section
/// `bangumi_manage`; this store reads either name but only ever writes `rename`.
pub const RENAME_SECTION: &str = "rename";
/// Legacy alias accepted (read-only) for [`RENAME_SECTION`].
const RENAME_SECTION_ALIAS: &str = "bangumi_manage";

/// A loaded `config.json` document plus its on-disk path.
///
/// Internally synchronized with a single [`RwLock`]: every module in the process shares
/// one store instance, and config saves are infrequent compared to reads.
pub struct ConfigStore {
    path: PathBuf,
    document: RwLock<Map<String, Value>>,
}

impl ConfigStore {
    /// Load `path`, creating an empty `{}` document (and any missing parent directories)
    /// if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`]/[`ConfigError::Write`] on I/O failure, or
    /// [`ConfigError::Malformed`]/[`ConfigError::NotAnObject`] if the file exists but is
    /// not a JSON object.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(raw) => parse_document(&path, &raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file missing, creating empty document");
                write_document(&path, &Map::new())?;
                Map::new()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        Ok(Self {
            path,
            document: RwLock::new(document),
        })
    }

    /// Fetch section `name`, merging in defaults for any field missing from the stored
    /// value. If the section is absent entirely, `T::default()` is inserted and the
    /// document is saved immediately so the file reflects what first ran.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SectionDecode`] if the stored value (after merging
    /// defaults) still cannot be decoded into `T`, or a write error if the section had
    /// to be created.
    pub fn get_or_default<T>(&self, name: &str) -> ConfigResult<T>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        {
            let document = self.read_lock();
            if let Some(existing) = document.get(name) {
                return decode_merged::<T>(name, existing);
            }
        }

        let default = T::default();
        let serialized = serde_json::to_value(&default).expect("section models always serialize");
        {
            let mut document = self.write_lock();
            document
                .entry(name.to_string())
                .or_insert_with(|| serialized.clone());
        }
        self.save()?;
        debug!(section = name, "registered default config section");
        Ok(default)
    }

    /// Overwrite section `name` with `value` and persist immediately.
    ///
    /// # Errors
    ///
    /// Returns a write error if the updated document cannot be saved.
    pub fn set<T: Serialize>(&self, name: &str, value: &T) -> ConfigResult<()> {
        let serialized = serde_json::to_value(value).expect("section models always serialize");
        {
            let mut document = self.write_lock();
            document.insert(name.to_string(), serialized);
        }
        self.save()
    }

    /// Persist the current in-memory document to disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Write`] on I/O failure.
    pub fn save(&self) -> ConfigResult<()> {
        let document = self.read_lock();
        write_document(&self.path, &document)
    }

    /// Fetch the `rename`/`bangumi_manage` section, accepting either name on read but
    /// always writing back under [`RENAME_SECTION`].
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::get_or_default`].
    pub fn rename_config(&self) -> ConfigResult<RenameConfig> {
        {
            let document = self.read_lock();
            if let Some(existing) = document.get(RENAME_SECTION) {
                return decode_merged::<RenameConfig>(RENAME_SECTION, existing);
            }
            if let Some(legacy) = document.get(RENAME_SECTION_ALIAS) {
                return decode_merged::<RenameConfig>(RENAME_SECTION_ALIAS, legacy);
            }
        }
        self.get_or_default::<RenameConfig>(RENAME_SECTION)
    }

    /// Path this store loads from and saves to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Map<String, Value>> {
        self.document.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Map<String, Value>> {
        self.document.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn parse_document(path: &Path, raw: &str) -> ConfigResult<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).map_err(|source| ConfigError::Malformed {
        path: path.display().to_string(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAnObject {
            path: path.display().to_string(),
        }),
    }
}

fn write_document(path: &Path, document: &Map<String, Value>) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.display().to_string(),
                source,
            })?;
        }
    }
    let rendered = serde_json::to_string_pretty(document).expect("document always serializes");
    fs::write(path, rendered).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Merge `T::default()` with `existing`, with `existing`'s fields taking priority, then
/// decode the result into `T`. This is how an older on-disk section gains newly added
/// fields without losing what the operator already configured.
fn decode_merged<T>(section: &str, existing: &Value) -> ConfigResult<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    let mut merged = serde_json::to_value(T::default()).expect("section models always serialize");
    merge_in_place(&mut merged, existing);
    serde_json::from_value(merged).map_err(|source| ConfigError::SectionDecode {
        section: section.to_string(),
        source,
    })
}

/// Shallow-recursive overlay: for each key present in `overlay`, replace (or recurse
/// into) the corresponding key in `base`. Keys present only in `base` (i.e. defaults for
/// fields the stored document predates) are left untouched.
fn merge_in_place(base: &mut Value, overlay: &Value) {
    let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) else {
        return;
    };
    for (key, overlay_value) in overlay_map {
        match base_map.get_mut(key) {
            Some(base_value) if base_value.is_object() && overlay_value.is_object() => {
                merge_in_place(base_value, overlay_value);
            }
            _ => {
                base_map.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}
