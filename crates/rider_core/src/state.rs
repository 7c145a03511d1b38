//! Memoryless ride state machine: the state is a pure function of the latest
//! ride record, never of the previous state.

use shared::{
    domain::DriverId,
    protocol::{CancelledBy, Offer, Price, RideRecord, RideStatus},
};

use crate::ui::{RiderNotice, Screen};

pub const PLACEHOLDER_DRIVER_NAME: &str = "Captain";
pub const PLACEHOLDER_VEHICLE: &str = "Vehicle";
pub const PLACEHOLDER_PLATE: &str = "---";
pub const PLACEHOLDER_PRICE: &str = "Meter";

fn or_placeholder(value: Option<&String>, placeholder: &str) -> String {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}

fn price_or_placeholder(price: Option<&Price>) -> String {
    or_placeholder(price.map(Price::to_string).as_ref(), PLACEHOLDER_PRICE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferCard {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub price: String,
}

impl OfferCard {
    pub fn from_offer(driver_id: DriverId, offer: &Offer) -> Self {
        Self {
            driver_id,
            driver_name: or_placeholder(offer.driver_name.as_ref(), PLACEHOLDER_DRIVER_NAME),
            vehicle_model: or_placeholder(offer.vehicle_model.as_ref(), PLACEHOLDER_VEHICLE),
            vehicle_plate: or_placeholder(offer.vehicle_plate.as_ref(), PLACEHOLDER_PLATE),
            price: price_or_placeholder(offer.price.as_ref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    pub name: String,
    pub vehicle: String,
    pub plate: String,
    pub price: String,
    pub phone: Option<String>,
}

impl DriverInfo {
    pub fn from_record(record: &RideRecord) -> Self {
        Self {
            name: or_placeholder(record.driver_name.as_ref(), PLACEHOLDER_DRIVER_NAME),
            vehicle: or_placeholder(record.vehicle_model.as_ref(), PLACEHOLDER_VEHICLE),
            plate: or_placeholder(record.vehicle_plate.as_ref(), PLACEHOLDER_PLATE),
            price: price_or_placeholder(record.price.as_ref()),
            phone: record
                .driver_phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RideState {
    /// Record deleted upstream or never written.
    Absent,
    PendingNoOffers,
    /// One card per offer, ordered by driver id.
    PendingWithOffers(Vec<OfferCard>),
    Active(DriverInfo),
    Completed,
    Cancelled(CancelledBy),
}

impl RideState {
    pub fn from_snapshot(record: Option<&RideRecord>) -> Self {
        let Some(record) = record else {
            return Self::Absent;
        };

        match record.status {
            RideStatus::Pending if record.offers.is_empty() => Self::PendingNoOffers,
            RideStatus::Pending => Self::PendingWithOffers(
                record
                    .offers
                    .iter()
                    .map(|(driver_id, offer)| OfferCard::from_offer(driver_id.clone(), offer))
                    .collect(),
            ),
            RideStatus::Accepted | RideStatus::Confirmed => {
                Self::Active(DriverInfo::from_record(record))
            }
            RideStatus::Completed => Self::Completed,
            RideStatus::Cancelled => Self::Cancelled(CancelledBy::Unspecified),
            RideStatus::CancelledByRider => Self::Cancelled(CancelledBy::Rider),
            RideStatus::CancelledByDriver => Self::Cancelled(CancelledBy::Driver),
        }
    }

    /// Screen visible once this state has been projected.
    pub fn screen(&self) -> Screen {
        match self {
            Self::Absent | Self::Completed | Self::Cancelled(_) => Screen::Booking,
            Self::PendingNoOffers | Self::PendingWithOffers(_) => Screen::Waiting,
            Self::Active(_) => Screen::Active,
        }
    }

    /// Terminal states end the session; `Absent` also does, but silently.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Absent | Self::Completed | Self::Cancelled(_))
    }

    pub fn terminal_notice(&self, app_name: &str) -> Option<RiderNotice> {
        match self {
            Self::Completed => Some(RiderNotice::RideCompleted {
                app_name: app_name.to_string(),
            }),
            Self::Cancelled(by) => Some(RiderNotice::RideCancelled(*by)),
            Self::Absent | Self::PendingNoOffers | Self::PendingWithOffers(_) | Self::Active(_) => {
                None
            }
        }
    }
}
