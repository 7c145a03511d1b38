use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::DriverId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Accepted,
    Confirmed,
    Completed,
    Cancelled,
    CancelledByRider,
    CancelledByDriver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelledBy {
    Rider,
    Driver,
    Unspecified,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::CancelledByRider | Self::CancelledByDriver
        )
    }

    pub fn cancelled_by(self) -> Option<CancelledBy> {
        match self {
            Self::Cancelled => Some(CancelledBy::Unspecified),
            Self::CancelledByRider => Some(CancelledBy::Rider),
            Self::CancelledByDriver => Some(CancelledBy::Driver),
            Self::Pending | Self::Accepted | Self::Confirmed | Self::Completed => None,
        }
    }
}

/// Fare as written by the driver app: either a number or free text such as "Meter".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Amount(serde_json::Number),
    Label(String),
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(n) => write!(f, "{n}"),
            Self::Label(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Price {
    fn from(value: u64) -> Self {
        Self::Amount(value.into())
    }
}

/// Display text written by other apps: strings are kept, numbers are rendered,
/// anything else reads as missing.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Price>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => Some(Price::Amount(n)),
        Value::String(label) => Some(Price::Label(label)),
        _ => None,
    })
}

fn lenient_driver_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DriverId>, D::Error> {
    Ok(lenient_text(deserializer)?.map(DriverId::new))
}

/// Offers keyed by driver id. Numeric keys may come back as an array with
/// `null` holes; entries that are not offer objects are skipped.
fn lenient_offers<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<DriverId, Offer>, D::Error> {
    let entries: Vec<(String, Value)> = match Value::deserialize(deserializer)? {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Vec::new(),
    };
    Ok(entries
        .into_iter()
        .filter_map(|(driver_id, raw)| {
            serde_json::from_value::<Offer>(raw)
                .ok()
                .map(|offer| (DriverId::new(driver_id), offer))
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub driver_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub vehicle_model: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    #[serde(default, deserialize_with = "lenient_price", skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

/// Ride record as stored under `requests/{rideId}`. Only `status` is strict;
/// display fields and offers of unexpected shape decode as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRecord {
    pub status: RideStatus,
    #[serde(default, deserialize_with = "lenient_driver_id", skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub driver_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub vehicle_model: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    #[serde(default, deserialize_with = "lenient_price", skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, deserialize_with = "lenient_offers", skip_serializing_if = "BTreeMap::is_empty")]
    pub offers: BTreeMap<DriverId, Offer>,
}

impl RideRecord {
    pub fn pending() -> Self {
        Self {
            status: RideStatus::Pending,
            driver_id: None,
            driver_name: None,
            driver_phone: None,
            vehicle_model: None,
            vehicle_plate: None,
            price: None,
            offers: BTreeMap::new(),
        }
    }

    pub fn decode(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Partial write applied to a ride record. Only the populated fields are sent,
/// so everything else on the record (including `offers`) is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RideStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

impl RideRecordPatch {
    pub fn status(status: RideStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn confirm_offer(driver_id: &DriverId, offer: &Offer) -> Self {
        Self {
            status: Some(RideStatus::Confirmed),
            driver_id: Some(driver_id.clone()),
            driver_name: offer.driver_name.clone(),
            driver_phone: offer.driver_phone.clone(),
            vehicle_model: offer.vehicle_model.clone(),
            vehicle_plate: offer.vehicle_plate.clone(),
            price: offer.price.clone(),
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
