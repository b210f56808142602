use std::path::{Component, Path, PathBuf};

use log::{debug, error, info, warn};

use crate::engine::models::{AccessToken, AddOnDescriptor, Locator, UpdateOutcome};
use crate::error::{Result, UpdateError};
use crate::networking::{FetchCapability, FetchRequest};
use crate::storage::FileStore;
use crate::updater::{RepoRef, parse_repository};
use crate::util::{Deadline, format_size, within};

const ACCEPT_OCTET_STREAM: &str = "application/octet-stream";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileStatus {
    Written { bytes: u64 },
    Skipped,
    Failed(UpdateError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileOutcome {
    pub file: String,
    pub status: FileStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallReport {
    pub latest_version: String,
    pub destination: PathBuf,
    pub files: Vec<FileOutcome>,
    pub version_bumped: bool,
}

impl InstallReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &UpdateError)> {
        self.files.iter().filter_map(|f| match &f.status {
            FileStatus::Failed(err) => Some((f.file.as_str(), err)),
            _ => None,
        })
    }

    pub fn written(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Written { .. }))
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Downloads the assets of an available update and writes them to disk.
pub struct Installer<'a, F, S> {
    fetcher: &'a F,
    store: &'a S,
    api_root: &'a str,
    bump_on_partial_success: bool,
}

impl<'a, F: FetchCapability, S: FileStore> Installer<'a, F, S> {
    pub fn new(fetcher: &'a F, store: &'a S, api_root: &'a str) -> Self {
        Self {
            fetcher,
            store,
            api_root,
            bump_on_partial_success: true,
        }
    }

    /// Whether a run with some failed files still records the new version.
    pub fn bump_on_partial_success(mut self, enabled: bool) -> Self {
        self.bump_on_partial_success = enabled;
        self
    }

    /// Install every asset of `outcome` into `destination`, one file at a time.
    ///
    /// A file that cannot be fetched or written is reported and the remaining
    /// files are still attempted. Only a missing destination folder aborts.
    pub async fn install(
        &self,
        descriptor: &mut AddOnDescriptor,
        destination: &Path,
        outcome: &UpdateOutcome,
        deadline: Deadline,
    ) -> Result<InstallReport> {
        let mut report = InstallReport {
            latest_version: outcome.latest_version.clone(),
            destination: destination.to_path_buf(),
            files: Vec::with_capacity(outcome.assets.len()),
            version_bumped: false,
        };
        if !outcome.update_available {
            debug!("installer: {} already up to date", descriptor.name);
            return Ok(report);
        }

        within(deadline, "creating destination folder", async {
            self.store.ensure_dir(destination).await.map_err(|e| {
                UpdateError::DestinationUnavailable {
                    path: destination.to_path_buf(),
                    reason: e.to_string(),
                }
            })
        })
        .await
        .inspect_err(|err| error!("installer: {}: {err}", descriptor.name))?;

        let repo = parse_repository(&descriptor.repo_url).ok();
        for (file, locator) in outcome.assets.iter() {
            let status = if !is_plain_file_name(file) {
                let err = UpdateError::AssetWriteFailed {
                    file: file.to_owned(),
                    reason: "invalid file name".into(),
                };
                warn!("installer: {}: {err}", descriptor.name);
                FileStatus::Failed(err)
            } else if locator.is_resolvable() {
                match self
                    .install_file(file, locator, destination, repo.as_ref(), descriptor, deadline)
                    .await
                {
                    Ok(bytes) => FileStatus::Written { bytes },
                    Err(err) => {
                        warn!("installer: {}: {err}", descriptor.name);
                        FileStatus::Failed(err)
                    }
                }
            } else {
                warn!(
                    "installer: {}: skipping {file}, release lists no download location",
                    descriptor.name
                );
                FileStatus::Skipped
            };
            report.files.push(FileOutcome {
                file: file.to_owned(),
                status,
            });
        }

        if report.is_complete() || self.bump_on_partial_success {
            descriptor.installed_version = Some(outcome.latest_version.clone());
            report.version_bumped = true;
        }
        info!(
            "installer: {} -> {} ({} written, {} failed, version {})",
            descriptor.name,
            outcome.latest_version,
            report.written(),
            report.failures().count(),
            if report.version_bumped { "recorded" } else { "unchanged" }
        );
        Ok(report)
    }

    async fn install_file(
        &self,
        file: &str,
        locator: &Locator,
        destination: &Path,
        repo: Option<&RepoRef>,
        descriptor: &AddOnDescriptor,
        deadline: Deadline,
    ) -> Result<u64> {
        let bytes = within(
            deadline,
            &format!("downloading {file}"),
            self.fetch_artifact(file, locator, repo, descriptor.access_token.as_ref()),
        )
        .await?;

        let path = destination.join(file);
        within(deadline, &format!("writing {file}"), async {
            self.store
                .write_file(&path, &bytes)
                .await
                .map_err(|e| UpdateError::AssetWriteFailed {
                    file: file.to_owned(),
                    reason: e.to_string(),
                })
        })
        .await?;
        debug!(
            "installer: wrote {} ({})",
            path.display(),
            format_size(bytes.len() as u64)
        );
        Ok(bytes.len() as u64)
    }

    /// Fetch one artifact's bytes; an empty body counts as a failed download.
    pub async fn fetch_artifact(
        &self,
        file: &str,
        locator: &Locator,
        repo: Option<&RepoRef>,
        token: Option<&AccessToken>,
    ) -> Result<Vec<u8>> {
        let download_failed = |reason: String| UpdateError::AssetDownloadFailed {
            file: file.to_owned(),
            reason,
        };

        let request = match locator {
            Locator::DirectUrl(url) => FetchRequest::get(url),
            Locator::AuthenticatedAssetId(id) => {
                let repo = repo.ok_or_else(|| {
                    download_failed("repository unknown for asset download".into())
                })?;
                let url = format!("{}/releases/assets/{id}", repo.api_base(self.api_root));
                let mut request = FetchRequest::get(url).header("Accept", ACCEPT_OCTET_STREAM);
                if let Some(token) = token {
                    request = request.header("Authorization", token.bearer_header());
                }
                request
            }
        };

        let response = self
            .fetcher
            .fetch(request)
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        if !response.ok() {
            return Err(download_failed(format!(
                "{} {}",
                response.status, response.status_text
            )));
        }
        if response.body.is_empty() {
            return Err(download_failed("empty response".into()));
        }
        Ok(response.body)
    }
}

/// Asset names must be a single path component so writes stay inside the destination.
fn is_plain_file_name(file: &str) -> bool {
    let mut components = Path::new(file).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
