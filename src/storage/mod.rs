use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::fs;

use crate::engine::models::Settings;
use crate::env;
use crate::error::{Result, UpdateError};

/// Folder and file primitives the installer writes through.
pub trait FileStore {
    /// Create `path` and its parents; an existing folder is not an error.
    async fn ensure_dir(&self, path: &Path) -> std::io::Result<()>;

    /// Replace the file at `path` with `bytes`.
    async fn write_file(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;
}

impl<T: FileStore> FileStore for &T {
    async fn ensure_dir(&self, path: &Path) -> std::io::Result<()> {
        (**self).ensure_dir(path).await
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        (**self).write_file(path, bytes).await
    }
}

/// Writes straight to the local filesystem.
#[derive(Clone, Debug, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    async fn ensure_dir(&self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = staging_path(path);
        fs::write(&tmp, bytes).await?;
        if let Err(err) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err);
        }
        Ok(())
    }
}

/// Sibling path used while a file is being written.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".download-tmp");
    path.with_file_name(name)
}

/// Loads and saves the JSON settings file.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Self {
        // Best-effort directory creation; failures are surfaced on save.
        let _ = env::ensure_base_dirs();
        Self::new(env::settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Settings> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("settings: {} missing, using defaults", self.path.display());
                return Ok(Settings::default());
            }
            Err(err) => {
                return Err(UpdateError::Settings(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };
        let settings: Settings = serde_json::from_slice(&bytes).map_err(|e| {
            UpdateError::Settings(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        if settings.check_period_minutes == 0 {
            return Err(UpdateError::Settings(
                "check_period_minutes must be greater than zero".into(),
            ));
        }
        Ok(settings)
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(settings)
            .map_err(|e| UpdateError::Settings(format!("failed to serialize settings: {e}")))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                UpdateError::Settings(format!("unable to create settings dir: {e}"))
            })?;
        }
        LocalFileStore
            .write_file(&self.path, &bytes)
            .await
            .map_err(|e| UpdateError::Settings(format!("failed to write settings: {e}")))?;
        info!("settings: saved {} add-ons to {}", settings.plugins.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{AccessToken, AddOnDescriptor, AssetPolicy};

    #[tokio::test]
    async fn creates_nested_folders_idempotently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("plugins").join("tracker");
        LocalFileStore.ensure_dir(&target).await.expect("first create");
        LocalFileStore.ensure_dir(&target).await.expect("second create");
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn overwrites_existing_files_without_leftovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("main.js");
        LocalFileStore.write_file(&target, b"old").await.expect("write old");
        LocalFileStore.write_file(&target, b"new").await.expect("write new");

        assert_eq!(std::fs::read(&target).expect("read back"), b"new");
        let entries = std::fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn fails_to_write_into_missing_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("absent").join("main.js");
        assert!(LocalFileStore.write_file(&target, b"x").await.is_err());
    }

    #[test]
    fn stages_next_to_target() {
        assert_eq!(
            staging_path(Path::new("/a/b/styles.css")),
            PathBuf::from("/a/b/styles.css.download-tmp")
        );
    }

    #[tokio::test]
    async fn missing_settings_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load().await.expect("load"), Settings::default());
    }

    #[tokio::test]
    async fn round_trips_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));

        let mut plugin = AddOnDescriptor::new("tracker", "https://github.com/owner/repo");
        plugin.installed_version = Some("v1.0.1".into());
        plugin.access_token = Some(AccessToken::new("ghp_secret"));
        let settings = Settings {
            plugins: vec![plugin],
            auto_install: true,
            asset_policy: AssetPolicy::FullSet,
            ..Settings::default()
        };

        store.save(&settings).await.expect("save");
        assert_eq!(store.load().await.expect("load"), settings);
    }

    #[tokio::test]
    async fn rejects_zero_check_period() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"check_period_minutes": 0}"#).expect("seed");
        let err = SettingsStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, UpdateError::Settings(_)));
    }

    #[tokio::test]
    async fn reports_corrupt_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").expect("seed");
        assert!(SettingsStore::new(path).load().await.is_err());
    }
}
