//! Terminal presentation: a headless screen model that redraws itself whenever
//! the visible text changes, plus stdin-backed rider prompts.

use std::{
    fmt::Write as _,
    io::Write as _,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rider_core::{
    Field, HeadlessRenderer, OfferCard, RenderError, RiderNotice, RiderPrompt, Screen,
    ScreenRenderer, ScreenSnapshot,
};
use tokio::sync::oneshot;

pub fn render_text(snapshot: &ScreenSnapshot) -> String {
    let mut out = String::new();
    match snapshot.visible {
        None => {}
        Some(Screen::Booking) => {
            let _ = writeln!(out, "== Book a ride ==");
            let _ = writeln!(out, "   `watch <ride-id>` follows a booked ride");
        }
        Some(Screen::Waiting) => {
            let _ = writeln!(out, "== Finding your driver... ==");
            if snapshot.offers_visible {
                for card in &snapshot.offers {
                    let _ = writeln!(
                        out,
                        "   [{}] {} | {} | {} | Rs. {}   (`confirm {}`)",
                        card.driver_id,
                        card.driver_name,
                        card.vehicle_model,
                        card.vehicle_plate,
                        card.price,
                        card.driver_id
                    );
                }
            }
        }
        Some(Screen::Active) => {
            let field = |f: Field| snapshot.field(f).unwrap_or_default();
            let _ = writeln!(out, "== Captain found! Your ride is on the way ==");
            let _ = writeln!(out, "   Driver:  {}", field(Field::DriverName));
            let _ = writeln!(
                out,
                "   Vehicle: {} | {}",
                field(Field::Vehicle),
                field(Field::Plate)
            );
            let _ = writeln!(out, "   Price:   Rs. {}", field(Field::Price));
            if let Some(link) = &snapshot.call_link {
                let _ = writeln!(out, "   Call:    {link}");
            }
            let _ = writeln!(out, "   `cancel` cancels the ride");
        }
    }
    out
}

pub struct TerminalRenderer {
    model: HeadlessRenderer,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self {
            model: HeadlessRenderer::new(),
        }
    }

    pub fn draw_current(&self) -> Result<(), RenderError> {
        let snapshot = self.model.snapshot()?;
        draw(&render_text(&snapshot))
    }

    fn redraw_after(
        &self,
        op: impl FnOnce(&HeadlessRenderer) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let before = render_text(&self.model.snapshot()?);
        op(&self.model)?;
        let after = render_text(&self.model.snapshot()?);
        if before != after {
            draw(&after)?;
        }
        Ok(())
    }
}

fn draw(text: &str) -> Result<(), RenderError> {
    let mut out = std::io::stdout().lock();
    writeln!(out)?;
    write!(out, "{text}")?;
    out.flush()?;
    Ok(())
}

impl ScreenRenderer for TerminalRenderer {
    fn show_screen(&self, screen: Screen) -> Result<(), RenderError> {
        self.redraw_after(|model| model.show_screen(screen))
    }

    fn ensure_screen(&self, screen: Screen) -> Result<(), RenderError> {
        self.redraw_after(|model| model.ensure_screen(screen))
    }

    fn set_field(&self, field: Field, value: &str) -> Result<(), RenderError> {
        self.redraw_after(|model| model.set_field(field, value))
    }

    fn set_call_link(&self, phone: Option<&str>) -> Result<(), RenderError> {
        self.redraw_after(|model| model.set_call_link(phone))
    }

    fn show_offers(&self, offers: &[OfferCard]) -> Result<(), RenderError> {
        self.redraw_after(|model| model.show_offers(offers))
    }

    fn hide_offers(&self) -> Result<(), RenderError> {
        self.redraw_after(|model| model.hide_offers())
    }
}

/// Slot through which the stdin reader hands the next line to a pending
/// yes/no question instead of parsing it as a command.
pub type AnswerSlot = Arc<Mutex<Option<oneshot::Sender<String>>>>;

pub struct TerminalPrompt {
    answers: Option<AnswerSlot>,
}

impl TerminalPrompt {
    /// Prompt that accepts every offer without asking.
    pub fn auto_confirm() -> Self {
        Self { answers: None }
    }

    pub fn interactive(answers: AnswerSlot) -> Self {
        Self {
            answers: Some(answers),
        }
    }
}

#[async_trait]
impl RiderPrompt for TerminalPrompt {
    async fn notify(&self, notice: &RiderNotice) {
        println!("\n!! {}", notice.message());
    }

    async fn confirm_offer(&self, offer: &OfferCard) -> bool {
        println!(
            "\n?? Ride with {} ({}, {}) for Rs. {}? [y/N]",
            offer.driver_name, offer.vehicle_model, offer.vehicle_plate, offer.price
        );
        let Some(slot) = &self.answers else {
            println!("y");
            return true;
        };

        let (tx, rx) = oneshot::channel();
        match slot.lock() {
            Ok(mut pending) => *pending = Some(tx),
            Err(_) => return false,
        }
        match rx.await {
            Ok(answer) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}
