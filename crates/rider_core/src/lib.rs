//! Rider-side ride tracking: a memoryless state machine over the remote ride
//! record, projected onto the rider's screen through capability traits.

pub mod controller;
pub mod headless;
pub mod state;
pub mod ui;

pub use controller::{
    CancelRideError, ConfirmOfferError, ConfirmOutcome, ControllerEvent, ControllerSession,
    RideStatusController, RiderCommand,
};
pub use headless::{HeadlessRenderer, ScreenSnapshot};
pub use state::{DriverInfo, OfferCard, RideState};
pub use ui::{Field, RenderError, RiderNotice, RiderPrompt, Screen, ScreenRenderer};
