//! Parsers for `vastai --raw` output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::offer::{Offer, normalise_id};

use super::{InstanceId, InstanceStatus, MarketplaceError};

const ID_FIELDS: [&str; 3] = ["new_contract", "id", "instance_id"];
const READY_STATES: [&str; 2] = ["running", "ready"];
const FAILED_STATES: [&str; 3] = ["failed", "error", "stopped"];

static ID_IN_TEXT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"['"](?:new_contract|instance_id|id)['"]\s*:\s*(\d+)"#).ok()
});

/// Parses the offer list returned by `vastai search offers --raw`.
///
/// # Errors
///
/// Returns [`MarketplaceError::Query`] when the output is not a JSON array of
/// offers.
pub fn parse_offers(stdout: &str) -> Result<Vec<Offer>, MarketplaceError> {
    serde_json::from_str::<Vec<Offer>>(stdout.trim()).map_err(|err| MarketplaceError::Query {
        message: err.to_string(),
        raw: stdout.to_owned(),
    })
}

/// Extracts the new instance identifier from `vastai create instance` output.
///
/// Structured output is searched for `new_contract`, `id`, then
/// `instance_id`. Output that is not JSON at all falls back to a pattern
/// search for a numeric identifier in the raw text.
///
/// # Errors
///
/// Returns [`MarketplaceError::Provisioning`] when no identifier is found.
pub fn parse_instance_id(stdout: &str) -> Result<InstanceId, MarketplaceError> {
    match serde_json::from_str::<Value>(stdout.trim()) {
        Ok(value) => ID_FIELDS
            .iter()
            .find_map(|field| value.get(*field).and_then(normalise_id))
            .map(InstanceId::new)
            .ok_or_else(|| MarketplaceError::Provisioning {
                message: String::from("response did not include an instance id"),
                raw: stdout.to_owned(),
            }),
        Err(err) => {
            warn!(error = %err, raw = stdout, "create response is not JSON; scanning raw text");
            id_from_text(stdout).ok_or_else(|| MarketplaceError::Provisioning {
                message: format!("response is not JSON ({err}) and contains no instance id"),
                raw: stdout.to_owned(),
            })
        }
    }
}

fn id_from_text(stdout: &str) -> Option<InstanceId> {
    let pattern = ID_IN_TEXT.as_ref()?;
    pattern
        .captures_iter(stdout)
        .filter_map(|captures| captures.get(1))
        .map(|found| found.as_str())
        .find(|digits| !digits.trim_start_matches('0').is_empty())
        .map(InstanceId::new)
}

/// Finds `instance` in `vastai show instances --raw` output and classifies
/// its state. An instance missing from the listing is [`InstanceStatus::Unlisted`].
///
/// # Errors
///
/// Returns [`MarketplaceError::Status`] when the output is not a JSON array.
pub fn parse_status(stdout: &str, instance: &InstanceId) -> Result<InstanceStatus, MarketplaceError> {
    let entries = serde_json::from_str::<Vec<Value>>(stdout.trim()).map_err(|err| {
        MarketplaceError::Status {
            message: err.to_string(),
            raw: stdout.to_owned(),
        }
    })?;

    let entry = entries.iter().find(|candidate| {
        candidate
            .get("id")
            .and_then(normalise_id)
            .is_some_and(|id| id == instance.as_str())
    });

    Ok(entry.map_or(InstanceStatus::Unlisted, |found| {
        let raw = found
            .get("actual_status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        classify_status(raw)
    }))
}

/// Classifies a raw marketplace state string, ignoring case.
#[must_use]
pub fn classify_status(raw: &str) -> InstanceStatus {
    let state = raw.trim().to_lowercase();
    if READY_STATES.contains(&state.as_str()) {
        InstanceStatus::Ready(raw.to_owned())
    } else if FAILED_STATES.contains(&state.as_str()) {
        InstanceStatus::Failed(raw.to_owned())
    } else {
        InstanceStatus::Pending(raw.to_owned())
    }
}
