//! Capability seams between the controller and whatever presents the ride.

use std::fmt;

use async_trait::async_trait;
use shared::protocol::CancelledBy;
use thiserror::Error;

use crate::state::OfferCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Screen {
    Booking,
    Waiting,
    Active,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Booking => "booking",
            Self::Waiting => "waiting",
            Self::Active => "active",
        };
        f.write_str(name)
    }
}

/// Driver details shown on the active-ride screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    DriverName,
    Vehicle,
    Plate,
    Price,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("screen '{0}' has not been built")]
    MissingScreen(Screen),
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
    #[error("renderer output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Presentation surface driven by the controller.
///
/// Implementations treat missing fields as no-ops; the controller logs any
/// returned error and carries on with the projection.
pub trait ScreenRenderer: Send + Sync {
    /// Hides every other screen and shows `screen`. Idempotent.
    fn show_screen(&self, screen: Screen) -> Result<(), RenderError>;
    /// Builds the screen's structure if it does not exist yet. Idempotent.
    fn ensure_screen(&self, screen: Screen) -> Result<(), RenderError>;
    fn set_field(&self, field: Field, value: &str) -> Result<(), RenderError>;
    /// Sets the tap-to-call target; `None` leaves the current link untouched.
    fn set_call_link(&self, phone: Option<&str>) -> Result<(), RenderError>;
    fn show_offers(&self, offers: &[OfferCard]) -> Result<(), RenderError>;
    fn hide_offers(&self) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiderNotice {
    RideCompleted { app_name: String },
    RideCancelled(CancelledBy),
    ConfirmFailed { reason: String },
}

impl RiderNotice {
    pub fn message(&self) -> String {
        match self {
            Self::RideCompleted { app_name } => {
                format!("Ride completed! Thank you for using {app_name}.")
            }
            Self::RideCancelled(CancelledBy::Driver) => "The driver cancelled the ride.".into(),
            Self::RideCancelled(CancelledBy::Rider) => "Your ride has been cancelled.".into(),
            Self::RideCancelled(CancelledBy::Unspecified) => "The ride was cancelled.".into(),
            Self::ConfirmFailed { reason } => {
                format!("Could not confirm the driver ({reason}). Please pick an offer again.")
            }
        }
    }
}

/// Blocking rider interactions: alerts and the yes/no offer confirmation.
#[async_trait]
pub trait RiderPrompt: Send + Sync {
    async fn notify(&self, notice: &RiderNotice);
    async fn confirm_offer(&self, offer: &OfferCard) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_messages_name_the_initiator() {
        assert!(RiderNotice::RideCancelled(CancelledBy::Driver)
            .message()
            .contains("driver"));
        assert_ne!(
            RiderNotice::RideCancelled(CancelledBy::Rider).message(),
            RiderNotice::RideCancelled(CancelledBy::Unspecified).message()
        );
    }

    #[test]
    fn completion_message_uses_app_name() {
        let notice = RiderNotice::RideCompleted {
            app_name: "RideLink".into(),
        };
        assert_eq!(
            notice.message(),
            "Ride completed! Thank you for using RideLink."
        );
    }
}
