use log::{debug, warn};

use crate::engine::models::{AssetPolicy, UpdateOutcome};
use crate::error::{Result, UpdateError};

/// Narrow an available update's assets according to the deployment policy.
///
/// File names are forwarded unchanged and keep their published order.
pub fn resolve(policy: &AssetPolicy, mut outcome: UpdateOutcome) -> Result<UpdateOutcome> {
    if !outcome.update_available {
        return Ok(outcome);
    }

    match policy {
        AssetPolicy::FullSet => {
            debug!(
                "resolver: forwarding all published assets [{}]",
                outcome.assets.names().collect::<Vec<_>>().join(", ")
            );
            Ok(outcome)
        }
        AssetPolicy::RequiredFiles { files } => {
            let missing: Vec<String> = files
                .iter()
                .filter(|name| {
                    !outcome
                        .assets
                        .get(name)
                        .is_some_and(|locator| locator.is_resolvable())
                })
                .cloned()
                .collect();
            if !missing.is_empty() {
                warn!("resolver: release is missing required files {missing:?}");
                return Err(UpdateError::MissingRequiredAssets { missing });
            }
            outcome
                .assets
                .retain(|name, _| files.iter().any(|required| required == name));
            Ok(outcome)
        }
    }
}
