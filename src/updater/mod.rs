use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;

use crate::engine::models::{
    AccessToken, AddOnDescriptor, Artifacts, Locator, LocatorMode, ReleaseInfo, UpdateOutcome,
};
use crate::error::{Result, UpdateError};
use crate::networking::{FetchCapability, FetchRequest};
use crate::util::{Deadline, within};

const ACCEPT_JSON: &str = "application/vnd.github+json";

static REPO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)github\.com[/:]([^/\s?#]+)/([^/\s?#]+)").expect("repository pattern is valid")
});

/// Owner and project of a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub project: String,
}

impl RepoRef {
    /// `https://api.github.com/repos/{owner}/{project}` for the given API root.
    pub fn api_base(&self, api_root: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            api_root.trim_end_matches('/'),
            self.owner,
            self.project
        )
    }
}

/// Extract owner and project from a GitHub URL (https, ssh or scp-like form).
pub fn parse_repository(reference: &str) -> Result<RepoRef> {
    let unsupported = || UpdateError::UnsupportedRepository {
        reference: reference.to_owned(),
    };
    let caps = REPO_PATTERN.captures(reference.trim()).ok_or_else(unsupported)?;
    let owner = caps[1].to_owned();
    let project = caps[2].strip_suffix(".git").unwrap_or(&caps[2]).to_owned();
    if project.is_empty() {
        return Err(unsupported());
    }
    Ok(RepoRef { owner, project })
}

#[derive(Debug, Deserialize)]
struct ReleasePayload {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    assets: Option<Vec<AssetPayload>>,
}

#[derive(Debug, Deserialize)]
struct AssetPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    browser_download_url: Option<String>,
}

/// Ask the hosting service for the latest published release of `reference`.
///
/// Makes exactly one request, and none at all when the reference is not a
/// GitHub repository.
///
/// # Errors
/// `UnsupportedRepository`, `ReleaseFetchFailed` on a non-success status,
/// `MalformedRelease` when the payload cannot be read, `Network`/`TimedOut`
/// when the request itself fails.
pub async fn fetch_latest_release<F: FetchCapability>(
    fetcher: &F,
    api_root: &str,
    reference: &str,
    token: Option<&AccessToken>,
    mode: LocatorMode,
    deadline: Deadline,
) -> Result<ReleaseInfo> {
    let repo = parse_repository(reference)?;
    let url = format!("{}/releases/latest", repo.api_base(api_root));
    let mut request = FetchRequest::get(&url).header("Accept", ACCEPT_JSON);
    if let Some(token) = token {
        request = request.header("Authorization", token.bearer_header());
    }

    debug!("updater: requesting {url}");
    let response = within(deadline, "fetching latest release", fetcher.fetch(request)).await?;
    if !response.ok() {
        warn!(
            "updater: release request for {}/{} returned {} {}",
            repo.owner, repo.project, response.status, response.status_text
        );
        debug!("updater: error body: {}", response.text());
        return Err(UpdateError::ReleaseFetchFailed {
            status: response.status,
            status_text: response.status_text,
        });
    }

    let payload: ReleasePayload = response.json()?;
    let release = release_from_payload(payload, mode)?;
    info!(
        "updater: {}/{} latest release {} ({} assets)",
        repo.owner,
        repo.project,
        release.latest_version,
        release.artifacts.len()
    );
    Ok(release)
}

fn release_from_payload(payload: ReleasePayload, mode: LocatorMode) -> Result<ReleaseInfo> {
    let latest_version = payload
        .tag_name
        .filter(|tag| !tag.is_empty())
        .or(payload.name.filter(|name| !name.is_empty()))
        .ok_or_else(|| UpdateError::MalformedRelease("release has no tag or name".into()))?;

    let mut artifacts = Artifacts::new();
    for asset in payload.assets.unwrap_or_default() {
        let Some(name) = asset.name.filter(|n| !n.is_empty()) else {
            continue;
        };
        let locator = match mode {
            LocatorMode::DirectUrl => {
                Locator::DirectUrl(asset.browser_download_url.unwrap_or_default())
            }
            LocatorMode::AuthenticatedAssetId => match asset.id {
                Some(id) => Locator::AuthenticatedAssetId(id),
                None => continue,
            },
        };
        artifacts.insert(name, locator);
    }

    Ok(ReleaseInfo {
        latest_version,
        artifacts,
    })
}

/// Compare the published release against what the add-on has installed.
///
/// Tags are opaque: only exact equality counts as up to date.
pub fn decide(descriptor: &AddOnDescriptor, release: &ReleaseInfo) -> Result<UpdateOutcome> {
    if descriptor.installed_version.as_deref() == Some(release.latest_version.as_str()) {
        return Ok(UpdateOutcome::up_to_date(&release.latest_version));
    }
    if release.artifacts.is_empty() {
        warn!("updater: no assets found for release of {}", descriptor.name);
        return Err(UpdateError::NoAssetsPublished);
    }
    Ok(UpdateOutcome {
        update_available: true,
        latest_version: release.latest_version.clone(),
        assets: release.artifacts.clone(),
    })
}
