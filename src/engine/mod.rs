use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::engine::models::{AddOnDescriptor, AssetPolicy, LocatorMode, Settings, UpdateOutcome};
use crate::engine::state::{PassState, PassSummary};
use crate::error::Result;
use crate::installer::{InstallReport, Installer};
use crate::networking::FetchCapability;
use crate::notify::NotificationSink;
use crate::resolver;
use crate::storage::FileStore;
use crate::updater;
use crate::util::Deadline;

pub mod models;
pub mod state;

/// Settings a pass reads, detached from the descriptor list it mutates.
#[derive(Clone, Debug)]
pub struct PassOptions {
    pub api_base: String,
    pub locator_mode: LocatorMode,
    pub asset_policy: AssetPolicy,
    pub auto_install: bool,
    pub bump_on_partial_success: bool,
    pub plugins_root: PathBuf,
    pub addon_timeout: Duration,
}

impl From<&Settings> for PassOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            api_base: settings.api_base.clone(),
            locator_mode: settings.locator_mode,
            asset_policy: settings.asset_policy.clone(),
            auto_install: settings.auto_install,
            bump_on_partial_success: settings.bump_on_partial_success,
            plugins_root: settings.plugins_root(),
            addon_timeout: Duration::from_secs(settings.addon_timeout_secs),
        }
    }
}

/// Drives the check-and-install pipeline over every registered add-on.
pub struct UpdateEngine<F, S, N> {
    fetcher: F,
    store: S,
    notifier: N,
}

impl<F: FetchCapability, S: FileStore, N: NotificationSink> UpdateEngine<F, S, N> {
    pub fn new(fetcher: F, store: S, notifier: N) -> Self {
        Self {
            fetcher,
            store,
            notifier,
        }
    }

    /// Release lookup, decision and asset resolution for one add-on.
    pub async fn check(
        &self,
        options: &PassOptions,
        descriptor: &AddOnDescriptor,
        deadline: Deadline,
    ) -> Result<UpdateOutcome> {
        let release = updater::fetch_latest_release(
            &self.fetcher,
            &options.api_base,
            &descriptor.repo_url,
            descriptor.access_token.as_ref(),
            options.locator_mode,
            deadline,
        )
        .await?;
        let outcome = updater::decide(descriptor, &release)?;
        resolver::resolve(&options.asset_policy, outcome)
    }

    /// Check one add-on on demand and report the result; never installs.
    pub async fn check_single(
        &self,
        options: &PassOptions,
        descriptor: &AddOnDescriptor,
    ) -> Option<UpdateOutcome> {
        let deadline = Deadline::after(options.addon_timeout);
        match self.check(options, descriptor, deadline).await {
            Ok(outcome) => {
                if outcome.update_available {
                    self.notifier.notify(&format!(
                        "Update available for {}: {}",
                        descriptor.name, outcome.latest_version
                    ));
                } else {
                    self.notifier.notify(&format!(
                        "{} is up to date ({})",
                        descriptor.name, outcome.latest_version
                    ));
                }
                Some(outcome)
            }
            Err(err) => {
                warn!("engine: check failed for {}: {err}", descriptor.name);
                self.notifier
                    .notify(&format!("Error checking {}: {err}", descriptor.name));
                None
            }
        }
    }

    /// Run the pipeline for every add-on in order, one at a time.
    ///
    /// A failing add-on is reported and the pass moves on to the next one.
    pub async fn run_pass(
        &self,
        settings: &mut Settings,
        auto_install: bool,
        updates: &mpsc::UnboundedSender<PassState>,
    ) -> PassSummary {
        let mut options = PassOptions::from(&*settings);
        options.auto_install = auto_install;
        let mut summary = PassSummary::started();
        info!(
            "engine: pass started for {} add-ons (auto-install {})",
            settings.plugins.len(),
            options.auto_install
        );

        for descriptor in settings.plugins.iter_mut() {
            updates
                .send(PassState::Checking {
                    name: descriptor.name.clone(),
                })
                .ok();
            let deadline = Deadline::after(options.addon_timeout);

            let outcome = match self.check(&options, descriptor, deadline).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("engine: check failed for {}: {err}", descriptor.name);
                    self.notifier
                        .notify(&format!("Error checking {}: {err}", descriptor.name));
                    summary.failed += 1;
                    continue;
                }
            };

            if !outcome.update_available {
                debug!(
                    "engine: {} up to date at {}",
                    descriptor.name, outcome.latest_version
                );
                summary.up_to_date += 1;
                continue;
            }

            if !options.auto_install {
                info!(
                    "engine: update available for {}: {}",
                    descriptor.name, outcome.latest_version
                );
                self.notifier.notify(&format!(
                    "Update available for {}: {}",
                    descriptor.name, outcome.latest_version
                ));
                summary.available += 1;
                continue;
            }

            updates
                .send(PassState::Updating {
                    name: descriptor.name.clone(),
                })
                .ok();
            let destination = descriptor.destination_in(&options.plugins_root);
            let installer = Installer::new(&self.fetcher, &self.store, &options.api_base)
                .bump_on_partial_success(options.bump_on_partial_success);
            match installer
                .install(descriptor, &destination, &outcome, deadline)
                .await
            {
                Ok(report) => {
                    info!(
                        "engine: {} installed into {}",
                        descriptor.name,
                        report.destination.display()
                    );
                    self.notifier.notify(&install_notice(&descriptor.name, &report));
                    if report.is_complete() {
                        summary.updated += 1;
                    } else {
                        summary.failed += 1;
                    }
                }
                Err(err) => {
                    error!("engine: install failed for {}: {err}", descriptor.name);
                    self.notifier.notify(&format!(
                        "Error installing update for {}: {err}",
                        descriptor.name
                    ));
                    summary.failed += 1;
                }
            }
        }

        summary.finished_at = Utc::now();
        info!(
            "engine: pass finished in {} ms, {} checked ({} up to date, {} available, {} updated, {} failed)",
            (summary.finished_at - summary.started_at).num_milliseconds(),
            summary.checked(),
            summary.up_to_date,
            summary.available,
            summary.updated,
            summary.failed
        );
        updates
            .send(PassState::Complete {
                summary: summary.clone(),
            })
            .ok();
        summary
    }
}

fn install_notice(name: &str, report: &InstallReport) -> String {
    if report.is_complete() {
        return format!("Updated {name} to {}", report.latest_version);
    }
    let failed = report
        .failures()
        .map(|(file, err)| format!("{file} ({err})"))
        .collect::<Vec<_>>()
        .join("; ");
    if report.version_bumped {
        format!(
            "Updated {name} to {} with errors: {failed}",
            report.latest_version
        )
    } else {
        format!(
            "Update of {name} to {} incomplete: {failed}",
            report.latest_version
        )
    }
}
