use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::env;

/// Credential used for authenticated API calls. Never rendered in logs or notices.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnDescriptor {
    pub name: String,
    pub repo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
}

impl AddOnDescriptor {
    pub fn new(name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_url: repo_url.into(),
            destination: None,
            installed_version: None,
            access_token: None,
        }
    }

    /// Folder the artifacts land in; falls back to `<plugins_root>/<name>`.
    pub fn destination_in(&self, plugins_root: &Path) -> PathBuf {
        self.destination
            .clone()
            .unwrap_or_else(|| plugins_root.join(&self.name))
    }
}

/// Where an artifact's bytes can be fetched from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    DirectUrl(String),
    AuthenticatedAssetId(u64),
}

impl Locator {
    pub fn is_resolvable(&self) -> bool {
        match self {
            Locator::DirectUrl(url) => !url.trim().is_empty(),
            Locator::AuthenticatedAssetId(_) => true,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::DirectUrl(url) => f.write_str(url),
            Locator::AuthenticatedAssetId(id) => write!(f, "asset #{id}"),
        }
    }
}

/// File name to locator mapping that keeps the order assets were published in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Artifacts {
    entries: Vec<(String, Locator)>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced entry keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, locator: Locator) {
        let name = name.into();
        if let Some(existing) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = locator;
        } else {
            self.entries.push((name, locator));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Locator> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, locator)| locator)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Locator)> {
        self.entries.iter().map(|(n, l)| (n.as_str(), l))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Locator) -> bool) {
        self.entries.retain(|(n, l)| keep(n, l));
    }
}

impl<N: Into<String>> FromIterator<(N, Locator)> for Artifacts {
    fn from_iter<I: IntoIterator<Item = (N, Locator)>>(iter: I) -> Self {
        let mut artifacts = Artifacts::new();
        for (name, locator) in iter {
            artifacts.insert(name, locator);
        }
        artifacts
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub latest_version: String,
    pub artifacts: Artifacts,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub update_available: bool,
    pub latest_version: String,
    pub assets: Artifacts,
}

impl UpdateOutcome {
    pub fn up_to_date(latest_version: impl Into<String>) -> Self {
        Self {
            update_available: false,
            latest_version: latest_version.into(),
            assets: Artifacts::new(),
        }
    }
}

/// How the artifact set of a release is narrowed before install.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetPolicy {
    RequiredFiles { files: Vec<String> },
    FullSet,
}

impl Default for AssetPolicy {
    fn default() -> Self {
        AssetPolicy::RequiredFiles {
            files: vec![
                "main.js".into(),
                "styles.css".into(),
                "manifest.json".into(),
            ],
        }
    }
}

/// Which field of a published asset becomes its locator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorMode {
    #[default]
    DirectUrl,
    AuthenticatedAssetId,
}

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub plugins: Vec<AddOnDescriptor>,
    pub check_period_minutes: u64,
    pub auto_install: bool,
    pub startup_delay_secs: u64,
    pub bump_on_partial_success: bool,
    pub asset_policy: AssetPolicy,
    pub locator_mode: LocatorMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins_root: Option<PathBuf>,
    pub addon_timeout_secs: u64,
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            check_period_minutes: 60,
            auto_install: false,
            startup_delay_secs: 5,
            bump_on_partial_success: true,
            asset_policy: AssetPolicy::default(),
            locator_mode: LocatorMode::default(),
            plugins_root: None,
            addon_timeout_secs: 120,
            api_base: DEFAULT_API_BASE.into(),
        }
    }
}

impl Settings {
    pub fn plugins_root(&self) -> PathBuf {
        self.plugins_root.clone().unwrap_or_else(env::plugins_dir)
    }

    pub fn find(&self, name: &str) -> Option<&AddOnDescriptor> {
        self.plugins.iter().find(|p| p.name == name)
    }
}
