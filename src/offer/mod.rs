//! Marketplace offers and cheapest-eligible selection.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// A rentable listing as returned by `vastai search offers --raw`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Offer {
    /// Identifier used to accept the offer.
    #[serde(rename = "ask_contract_id", default, deserialize_with = "optional_id")]
    pub offer_id: Option<String>,
    /// Host machine identifier; listings without one cannot be rented.
    #[serde(default, deserialize_with = "optional_id")]
    pub machine_id: Option<String>,
    /// Total hourly price in dollars.
    #[serde(rename = "dph_total", default)]
    pub price: Option<f64>,
    /// Disk space available to the instance, in gigabytes.
    #[serde(rename = "disk_space", default)]
    pub disk_gb: Option<f64>,
    /// Number of GPUs in the listing.
    #[serde(default)]
    pub num_gpus: Option<u32>,
    /// GPU model name.
    #[serde(default)]
    pub gpu_name: Option<String>,
    /// Free-form host location.
    #[serde(default)]
    pub geolocation: Option<String>,
}

impl Offer {
    /// Returns `true` when the offer can be accepted and has at least
    /// `min_disk_gb` of disk.
    #[must_use]
    pub fn is_eligible(&self, min_disk_gb: f64) -> bool {
        self.offer_id.is_some()
            && self.machine_id.is_some()
            && self.disk_gb.unwrap_or_default() >= min_disk_gb
    }
}

/// Errors raised by offer selection.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum OfferError {
    /// Raised when no offer satisfies the constraints.
    #[error("no eligible offer among {considered} with at least {min_disk_gb} GB disk")]
    NoEligibleOffer {
        /// Number of offers inspected.
        considered: usize,
        /// Minimum disk requested.
        min_disk_gb: f64,
    },
}

/// Picks the cheapest offer that is rentable and has enough disk.
///
/// Offers without a price sort after every priced offer. Ties keep the
/// marketplace's order.
///
/// # Errors
///
/// Returns [`OfferError::NoEligibleOffer`] when `offers` is empty or nothing
/// satisfies the constraints.
pub fn select_offer(offers: &[Offer], min_disk_gb: f64) -> Result<Offer, OfferError> {
    let mut ranked: Vec<&Offer> = offers.iter().collect();
    ranked.sort_by(|left, right| compare_price(left.price, right.price));

    ranked
        .into_iter()
        .find(|offer| offer.is_eligible(min_disk_gb))
        .cloned()
        .ok_or(OfferError::NoEligibleOffer {
            considered: offers.len(),
            min_disk_gb,
        })
}

fn compare_price(left: Option<f64>, right: Option<f64>) -> Ordering {
    match (left, right) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Normalises an identifier that the marketplace may send as a number or a
/// string. Null, `false`, empty strings, and zero are treated as absent.
#[must_use]
pub fn normalise_id(value: &Value) -> Option<String> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_owned(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => return None,
    };
    if text.is_empty() || text == "0" {
        None
    } else {
        Some(text)
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalise_id(&value))
}
