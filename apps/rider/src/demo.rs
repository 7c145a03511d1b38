//! Scripted ride against an in-memory store: a booking receives two offers,
//! the rider confirms one and the driver completes the trip.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use realtime_store::{MemoryStore, RealtimeStore};
use rider_core::{
    ControllerEvent, RideState, RideStatusController, RiderCommand, RiderPrompt, ScreenRenderer,
};
use serde_json::json;
use shared::{
    domain::{DriverId, RideId},
    protocol::{RideRecord, RideRecordPatch, RideStatus},
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::info;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

async fn wait_for_event(
    events: &mut broadcast::Receiver<ControllerEvent>,
    what: &str,
    matches: impl Fn(&ControllerEvent) -> bool,
) -> Result<ControllerEvent> {
    tokio::time::timeout(STEP_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return Ok(event),
                Ok(ControllerEvent::CommandFailed(reason)) => bail!("{reason}"),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => bail!("controller stopped"),
            }
        }
    })
    .await
    .map_err(|_| anyhow!("timed out waiting for {what}"))?
}

fn state_is(event: &ControllerEvent, wanted: impl Fn(&RideState) -> bool) -> bool {
    matches!(event, ControllerEvent::StateChanged { state, .. } if wanted(state))
}

pub async fn run_demo(
    renderer: Arc<dyn ScreenRenderer>,
    prompt: Arc<dyn RiderPrompt>,
    app_name: &str,
    pace: Duration,
) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let controller = RideStatusController::new(store.clone(), renderer, prompt)
        .with_app_name(app_name);
    let mut events = controller.subscribe_events();

    let (trigger_tx, trigger_rx) = watch::channel(None);
    let (command_tx, command_rx) = mpsc::channel(8);
    let controller_task = tokio::spawn(controller.run(trigger_rx, command_rx));

    let ride = RideId::generate();
    let record = serde_json::to_value(RideRecord::pending()).context("encode booking")?;
    store.set(&ride.record_path(), record).await;
    info!("demo: booked ride={ride}");
    trigger_tx.send_replace(Some(ride.clone()));
    wait_for_event(&mut events, "waiting screen", |e| {
        state_is(e, |s| *s == RideState::PendingNoOffers)
    })
    .await?;

    let offers = [
        ("drv-asif", json!({ "driverName": "Asif", "vehicleModel": "Suzuki Alto", "vehiclePlate": "LEA-4411", "price": 450 })),
        ("drv-sana", json!({ "driverName": "Sana", "vehicleModel": "Toyota Corolla", "vehiclePlate": "LEC-1902", "price": "520" })),
    ];
    for (driver, offer) in offers {
        tokio::time::sleep(pace).await;
        store.set(&ride.offer_path(&DriverId::new(driver)), offer).await;
        info!("demo: offer from driver={driver}");
    }
    wait_for_event(&mut events, "both offers", |e| {
        state_is(e, |s| matches!(s, RideState::PendingWithOffers(cards) if cards.len() == 2))
    })
    .await?;

    tokio::time::sleep(pace).await;
    command_tx
        .send(RiderCommand::ConfirmOffer {
            driver_id: DriverId::new("drv-sana"),
        })
        .await
        .context("controller stopped before confirmation")?;
    wait_for_event(&mut events, "active ride", |e| {
        state_is(e, |s| matches!(s, RideState::Active(_)))
    })
    .await?;

    tokio::time::sleep(pace).await;
    store
        .update(
            &ride.record_path(),
            RideRecordPatch::status(RideStatus::Completed).into_map(),
        )
        .await?;
    wait_for_event(&mut events, "ride completion", |e| {
        matches!(e, ControllerEvent::SessionReleased(id) if *id == ride)
    })
    .await?;

    command_tx
        .send(RiderCommand::Shutdown)
        .await
        .context("controller stopped before shutdown")?;
    controller_task.await.context("controller task failed")?;
    info!("demo: finished ride={ride}");
    Ok(())
}
