//! Interactive `watch` session: stdin lines drive the ride trigger and rider
//! commands while the controller loop runs in the background.

use std::sync::Arc;

use anyhow::{Context, Result};
use realtime_store::{FirebaseRestStore, RealtimeStore};
use rider_core::{ControllerEvent, RideStatusController, RiderCommand, RiderPrompt};
use shared::domain::{DriverId, RideId};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{broadcast, mpsc, watch},
};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    terminal::{AnswerSlot, TerminalPrompt, TerminalRenderer},
};

const HELP: &str = "commands: watch <ride-id> | clear | confirm <driver-id> | cancel | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Watch(RideId),
    Clear,
    Confirm(DriverId),
    Cancel,
    Help,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> Result<InputLine, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(InputLine::Empty);
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments for '{verb}'"));
    }

    match (verb.to_ascii_lowercase().as_str(), arg) {
        ("watch", Some(id)) => Ok(InputLine::Watch(RideId::new(id))),
        ("watch", None) => Err("usage: watch <ride-id>".into()),
        ("confirm", Some(id)) => Ok(InputLine::Confirm(DriverId::new(id))),
        ("confirm", None) => Err("usage: confirm <driver-id>".into()),
        ("clear", None) => Ok(InputLine::Clear),
        ("cancel", None) => Ok(InputLine::Cancel),
        ("help", None) => Ok(InputLine::Help),
        ("quit" | "exit", None) => Ok(InputLine::Quit),
        _ => Err(format!("unknown command '{line}'")),
    }
}

pub fn connect_store(settings: &Settings) -> Result<Arc<dyn RealtimeStore>> {
    let url = settings
        .store_url
        .as_deref()
        .context("no store url configured (use --store-url or RIDER_STORE_URL)")?;
    let store = FirebaseRestStore::new(url, settings.auth_token.clone())
        .with_context(|| format!("invalid store url '{url}'"))?;
    info!("watch: store={url}");
    Ok(Arc::new(store))
}

fn spawn_event_printer(mut events: broadcast::Receiver<ControllerEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::CommandFailed(reason)) => println!("\n!! {reason}"),
                Ok(ControllerEvent::RecordRejected { ride_id, reason }) => {
                    println!("\n!! ride {ride_id} sent an unreadable update: {reason}")
                }
                Ok(event) => debug!("watch: event={event:?}"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("watch: event printer lagged skipped={skipped}")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

pub async fn run_watch(
    settings: &Settings,
    initial_ride: Option<RideId>,
    auto_confirm: bool,
) -> Result<()> {
    let store = connect_store(settings)?;
    let renderer = Arc::new(TerminalRenderer::new());
    let answers: AnswerSlot = AnswerSlot::default();
    let prompt: Arc<dyn RiderPrompt> = if auto_confirm {
        Arc::new(TerminalPrompt::auto_confirm())
    } else {
        Arc::new(TerminalPrompt::interactive(answers.clone()))
    };

    let controller = RideStatusController::new(store, renderer.clone(), prompt)
        .with_app_name(settings.app_name.clone());
    spawn_event_printer(controller.subscribe_events());

    let (trigger_tx, trigger_rx) = watch::channel(initial_ride);
    let (command_tx, command_rx) = mpsc::channel(16);
    let controller_task = tokio::spawn(controller.run(trigger_rx, command_rx));

    renderer.draw_current()?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let pending_answer = answers.lock().ok().and_then(|mut slot| slot.take());
        if let Some(answer) = pending_answer {
            let _ = answer.send(line);
            continue;
        }

        let command = match parse_line(&line) {
            Ok(InputLine::Empty) => continue,
            Ok(InputLine::Help) => {
                println!("{HELP}");
                continue;
            }
            Ok(InputLine::Quit) => break,
            Ok(InputLine::Watch(ride_id)) => {
                trigger_tx.send_replace(Some(ride_id));
                continue;
            }
            Ok(InputLine::Clear) => {
                trigger_tx.send_replace(None);
                continue;
            }
            Ok(InputLine::Confirm(driver_id)) => RiderCommand::ConfirmOffer { driver_id },
            Ok(InputLine::Cancel) => RiderCommand::CancelRide,
            Err(reason) => {
                println!("!! {reason}\n{HELP}");
                continue;
            }
        };
        if command_tx.send(command).await.is_err() {
            warn!("watch: controller stopped, leaving");
            break;
        }
    }

    let _ = command_tx.send(RiderCommand::Shutdown).await;
    controller_task.await.context("controller task failed")?;
    Ok(())
}
