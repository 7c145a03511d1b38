//! Ride-status controller: owns the single live subscription to the rider's
//! current ride record and projects every emission onto the screen.

use std::sync::Arc;

use anyhow::Context;
use realtime_store::{RealtimeStore, Subscription};
use serde_json::Value;
use shared::{
    domain::{DriverId, RideId},
    protocol::{Offer, RideRecord, RideRecordPatch, RideStatus},
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::{
    state::{OfferCard, RideState},
    ui::{Field, RenderError, RiderNotice, RiderPrompt, Screen, ScreenRenderer},
};

const DEFAULT_APP_NAME: &str = "RideLink";

#[derive(Debug, Error)]
pub enum ConfirmOfferError {
    #[error("no ride is being tracked")]
    NoActiveRide,
    #[error("ride {ride_id} is not waiting for offers (status {status:?})")]
    RideNotPending {
        ride_id: RideId,
        status: Option<RideStatus>,
    },
    #[error("driver {driver_id} has no offer on ride {ride_id}")]
    UnknownOffer { ride_id: RideId, driver_id: DriverId },
    #[error("offer from driver {driver_id} is malformed: {source}")]
    InvalidOffer {
        driver_id: DriverId,
        source: serde_json::Error,
    },
    #[error("failed to read offer from driver {driver_id}: {source}")]
    Read {
        driver_id: DriverId,
        source: anyhow::Error,
    },
    #[error("failed to confirm offer on ride {ride_id}: {source}")]
    Write {
        ride_id: RideId,
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum CancelRideError {
    #[error("no ride is being tracked")]
    NoActiveRide,
    #[error("ride {0} has already finished")]
    AlreadyFinished(RideId),
    #[error("failed to cancel ride {ride_id}: {source}")]
    Write {
        ride_id: RideId,
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    Declined,
}

/// Rider actions queued from the UI into the controller loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiderCommand {
    ConfirmOffer { driver_id: DriverId },
    CancelRide,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    SessionStarted(RideId),
    StateChanged { ride_id: RideId, state: RideState },
    RecordRejected { ride_id: RideId, reason: String },
    SessionReleased(RideId),
    CommandFailed(String),
}

/// Binding to exactly one ride and its live subscription.
pub struct ControllerSession {
    ride_id: RideId,
    subscription: Subscription,
    latest: Option<RideRecord>,
}

impl ControllerSession {
    pub fn ride_id(&self) -> &RideId {
        &self.ride_id
    }
}

pub struct RideStatusController {
    store: Arc<dyn RealtimeStore>,
    renderer: Arc<dyn ScreenRenderer>,
    prompt: Arc<dyn RiderPrompt>,
    app_name: String,
    session: Option<ControllerSession>,
    last_trigger: Option<RideId>,
    events: broadcast::Sender<ControllerEvent>,
}

fn log_render(op: &'static str, result: Result<(), RenderError>) {
    if let Err(err) = result {
        warn!("ride: render op={op} failed: {err}");
    }
}

impl RideStatusController {
    pub fn new(
        store: Arc<dyn RealtimeStore>,
        renderer: Arc<dyn ScreenRenderer>,
        prompt: Arc<dyn RiderPrompt>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store,
            renderer,
            prompt,
            app_name: DEFAULT_APP_NAME.to_string(),
            session: None,
            last_trigger: None,
            events,
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> Option<&ControllerSession> {
        self.session.as_ref()
    }

    pub fn active_ride(&self) -> Option<&RideId> {
        self.session.as_ref().map(ControllerSession::ride_id)
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    /// Starts tracking `ride_id`. A live session for the same ride is kept
    /// as is; any other session is released before the new subscription opens.
    pub async fn activate(&mut self, ride_id: RideId) -> anyhow::Result<()> {
        if self.active_ride() == Some(&ride_id) {
            debug!("ride: already listening ride={ride_id}");
            return Ok(());
        }

        self.release_session().await;

        let subscription = self
            .store
            .subscribe(&ride_id.record_path())
            .await
            .with_context(|| format!("failed to subscribe to ride {ride_id}"))?;
        info!(
            "ride: listening ride={ride_id} subscription={} path={}",
            subscription.id(),
            subscription.path()
        );
        self.session = Some(ControllerSession {
            ride_id: ride_id.clone(),
            subscription,
            latest: None,
        });
        self.emit(ControllerEvent::SessionStarted(ride_id));
        Ok(())
    }

    /// Drops the live subscription, if any. Updates still buffered for it are
    /// discarded with the receiver.
    pub async fn release_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let id = session.subscription.id();
        if let Err(err) = self.store.unsubscribe(id).await {
            warn!(
                "ride: unsubscribe failed ride={} subscription={id}: {err:#}",
                session.ride_id
            );
        }
        info!("ride: released ride={} subscription={id}", session.ride_id);
        self.emit(ControllerEvent::SessionReleased(session.ride_id));
    }

    /// Handles one emission of the live subscription and returns the state it
    /// was projected as. Emissions that do not decode leave the screen as is.
    pub async fn apply_update(&mut self, snapshot: Option<Value>) -> Option<RideState> {
        let Some(session) = self.session.as_mut() else {
            debug!("ride: update ignored, no live session");
            return None;
        };
        let ride_id = session.ride_id.clone();

        let record = match snapshot.map(RideRecord::decode).transpose() {
            Ok(record) => record,
            Err(err) => {
                warn!("ride: unreadable record ride={ride_id}: {err}");
                self.emit(ControllerEvent::RecordRejected {
                    ride_id,
                    reason: err.to_string(),
                });
                return None;
            }
        };

        let state = RideState::from_snapshot(record.as_ref());
        session.latest = record;
        debug!("ride: ride={ride_id} state={state:?}");

        self.project(&state).await;
        self.emit(ControllerEvent::StateChanged {
            ride_id,
            state: state.clone(),
        });
        Some(state)
    }

    async fn project(&mut self, state: &RideState) {
        if state.ends_session() {
            match state.terminal_notice(&self.app_name) {
                Some(notice) => {
                    info!("ride: finished notice={notice:?}");
                    self.prompt.notify(&notice).await;
                }
                None => info!("ride: record removed, resetting"),
            }
            self.release_session().await;
            self.reset_to_booking();
            return;
        }

        let renderer = &self.renderer;
        match state {
            RideState::PendingNoOffers => {
                log_render("hide_offers", renderer.hide_offers());
                log_render("show_screen", renderer.show_screen(state.screen()));
            }
            RideState::PendingWithOffers(cards) => {
                log_render("show_screen", renderer.show_screen(state.screen()));
                log_render("show_offers", renderer.show_offers(cards));
            }
            RideState::Active(driver) => {
                log_render("ensure_screen", renderer.ensure_screen(state.screen()));
                log_render("set_field", renderer.set_field(Field::DriverName, &driver.name));
                log_render("set_field", renderer.set_field(Field::Vehicle, &driver.vehicle));
                log_render("set_field", renderer.set_field(Field::Plate, &driver.plate));
                log_render("set_field", renderer.set_field(Field::Price, &driver.price));
                log_render("set_call_link", renderer.set_call_link(driver.phone.as_deref()));
                log_render("show_screen", renderer.show_screen(state.screen()));
                log_render("hide_offers", renderer.hide_offers());
            }
            RideState::Absent | RideState::Completed | RideState::Cancelled(_) => {}
        }
    }

    fn reset_to_booking(&self) {
        log_render("hide_offers", self.renderer.hide_offers());
        log_render("show_screen", self.renderer.show_screen(Screen::Booking));
    }

    /// Accepts the offer of `driver_id` on the tracked ride after the rider
    /// confirms it. The offer list is hidden while the write is in flight and
    /// restored if the write fails.
    pub async fn confirm_offer(
        &mut self,
        driver_id: &DriverId,
    ) -> Result<ConfirmOutcome, ConfirmOfferError> {
        let session = self.session.as_ref().ok_or(ConfirmOfferError::NoActiveRide)?;
        let ride_id = session.ride_id.clone();
        let status = session.latest.as_ref().map(|r| r.status);
        if status != Some(RideStatus::Pending) {
            return Err(ConfirmOfferError::RideNotPending { ride_id, status });
        }

        let raw = self
            .store
            .read_once(&ride_id.offer_path(driver_id))
            .await
            .map_err(|source| ConfirmOfferError::Read {
                driver_id: driver_id.clone(),
                source,
            })?;
        let Some(raw) = raw else {
            return Err(ConfirmOfferError::UnknownOffer {
                ride_id,
                driver_id: driver_id.clone(),
            });
        };
        let offer: Offer =
            serde_json::from_value(raw).map_err(|source| ConfirmOfferError::InvalidOffer {
                driver_id: driver_id.clone(),
                source,
            })?;

        let card = OfferCard::from_offer(driver_id.clone(), &offer);
        if !self.prompt.confirm_offer(&card).await {
            info!("ride: rider declined offer ride={ride_id} driver={driver_id}");
            return Ok(ConfirmOutcome::Declined);
        }

        log_render("hide_offers", self.renderer.hide_offers());
        let patch = RideRecordPatch::confirm_offer(driver_id, &offer).into_map();
        if let Err(source) = self.store.update(&ride_id.record_path(), patch).await {
            error!("ride: confirm write failed ride={ride_id} driver={driver_id}: {source:#}");
            self.prompt
                .notify(&RiderNotice::ConfirmFailed {
                    reason: source.to_string(),
                })
                .await;
            self.restore_offer_list();
            return Err(ConfirmOfferError::Write { ride_id, source });
        }

        info!("ride: confirmed offer ride={ride_id} driver={driver_id}");
        Ok(ConfirmOutcome::Confirmed)
    }

    fn restore_offer_list(&self) {
        let latest = self.session.as_ref().and_then(|s| s.latest.as_ref());
        if let RideState::PendingWithOffers(cards) = RideState::from_snapshot(latest) {
            log_render("show_screen", self.renderer.show_screen(Screen::Waiting));
            log_render("show_offers", self.renderer.show_offers(&cards));
        }
    }

    /// Rider-initiated cancellation of the tracked ride. The terminal
    /// transition itself arrives through the subscription.
    pub async fn cancel_ride(&mut self) -> Result<(), CancelRideError> {
        let session = self.session.as_ref().ok_or(CancelRideError::NoActiveRide)?;
        let ride_id = session.ride_id.clone();
        if session.latest.as_ref().is_some_and(|r| r.status.is_terminal()) {
            return Err(CancelRideError::AlreadyFinished(ride_id));
        }

        let patch = RideRecordPatch::status(RideStatus::CancelledByRider).into_map();
        self.store
            .update(&ride_id.record_path(), patch)
            .await
            .map_err(|source| CancelRideError::Write {
                ride_id: ride_id.clone(),
                source,
            })?;
        info!("ride: cancellation requested ride={ride_id}");
        Ok(())
    }

    /// Reacts to the trigger naming the rider's current ride. Repeats of the
    /// last value are ignored until the trigger is cleared; clearing it leaves
    /// any live session running.
    pub async fn observe_trigger(&mut self, value: Option<RideId>) {
        let Some(ride_id) = value else {
            debug!("ride: trigger cleared");
            self.last_trigger = None;
            return;
        };
        if self.last_trigger.as_ref() == Some(&ride_id) {
            return;
        }
        self.last_trigger = Some(ride_id.clone());

        if let Err(err) = self.activate(ride_id).await {
            error!("ride: {err:#}");
            self.emit(ControllerEvent::CommandFailed(format!("{err:#}")));
        }
    }

    async fn next_update(&mut self) -> Option<Option<Value>> {
        match self.session.as_mut() {
            Some(session) => session.subscription.next().await,
            None => std::future::pending().await,
        }
    }

    async fn handle_command(&mut self, command: RiderCommand) {
        let result = match command {
            RiderCommand::ConfirmOffer { driver_id } => self
                .confirm_offer(&driver_id)
                .await
                .map(|_| ())
                .map_err(|err| err.to_string()),
            RiderCommand::CancelRide => self.cancel_ride().await.map_err(|err| err.to_string()),
            RiderCommand::Shutdown => Ok(()),
        };
        if let Err(reason) = result {
            warn!("ride: command failed: {reason}");
            self.emit(ControllerEvent::CommandFailed(reason));
        }
    }

    /// Event loop: follows the trigger, the live subscription and the rider's
    /// commands until `Shutdown` arrives or the command queue closes.
    pub async fn run(
        mut self,
        mut trigger: watch::Receiver<Option<RideId>>,
        mut commands: mpsc::Receiver<RiderCommand>,
    ) {
        let initial = trigger.borrow_and_update().clone();
        self.observe_trigger(initial).await;
        let mut trigger_open = true;

        loop {
            tokio::select! {
                changed = trigger.changed(), if trigger_open => {
                    if changed.is_err() {
                        debug!("ride: trigger sender dropped");
                        trigger_open = false;
                        continue;
                    }
                    let value = trigger.borrow_and_update().clone();
                    self.observe_trigger(value).await;
                }
                update = self.next_update() => match update {
                    Some(snapshot) => {
                        self.apply_update(snapshot).await;
                    }
                    None => {
                        warn!("ride: subscription stream ended by store");
                        self.release_session().await;
                    }
                },
                command = commands.recv() => match command {
                    Some(RiderCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
            }
        }

        self.release_session().await;
        info!("ride: controller stopped");
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
