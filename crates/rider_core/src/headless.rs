//! In-memory screen model implementing [`ScreenRenderer`].

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard},
};

use crate::{
    state::OfferCard,
    ui::{Field, RenderError, Screen, ScreenRenderer},
};

/// Fields that live on a screen and only exist once it has been built.
fn screen_of(field: Field) -> Screen {
    match field {
        Field::DriverName | Field::Vehicle | Field::Plate | Field::Price => Screen::Active,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSnapshot {
    pub built: BTreeSet<Screen>,
    pub visible: Option<Screen>,
    pub fields: BTreeMap<Field, String>,
    pub call_link: Option<String>,
    pub offers: Vec<OfferCard>,
    pub offers_visible: bool,
}

impl ScreenSnapshot {
    /// The booking form and waiting screen ship with the page; the active-ride
    /// screen is built on demand.
    pub fn initial() -> Self {
        Self {
            built: BTreeSet::from([Screen::Booking, Screen::Waiting]),
            visible: Some(Screen::Booking),
            fields: BTreeMap::new(),
            call_link: None,
            offers: Vec::new(),
            offers_visible: false,
        }
    }

    pub fn field(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }
}

pub struct HeadlessRenderer {
    state: Mutex<ScreenSnapshot>,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::with_snapshot(ScreenSnapshot::initial())
    }

    pub fn with_snapshot(snapshot: ScreenSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> Result<ScreenSnapshot, RenderError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ScreenSnapshot>, RenderError> {
        self.state
            .lock()
            .map_err(|_| RenderError::Unavailable("screen state lock poisoned".into()))
    }
}

impl ScreenRenderer for HeadlessRenderer {
    fn show_screen(&self, screen: Screen) -> Result<(), RenderError> {
        let mut state = self.lock()?;
        if !state.built.contains(&screen) {
            return Err(RenderError::MissingScreen(screen));
        }
        state.visible = Some(screen);
        Ok(())
    }

    fn ensure_screen(&self, screen: Screen) -> Result<(), RenderError> {
        self.lock()?.built.insert(screen);
        Ok(())
    }

    fn set_field(&self, field: Field, value: &str) -> Result<(), RenderError> {
        let mut state = self.lock()?;
        if state.built.contains(&screen_of(field)) {
            state.fields.insert(field, value.to_string());
        }
        Ok(())
    }

    fn set_call_link(&self, phone: Option<&str>) -> Result<(), RenderError> {
        let Some(phone) = phone else {
            return Ok(());
        };
        let mut state = self.lock()?;
        if state.built.contains(&Screen::Active) {
            state.call_link = Some(format!("tel:{phone}"));
        }
        Ok(())
    }

    fn show_offers(&self, offers: &[OfferCard]) -> Result<(), RenderError> {
        let mut state = self.lock()?;
        state.offers = offers.to_vec();
        state.offers_visible = !offers.is_empty();
        Ok(())
    }

    fn hide_offers(&self) -> Result<(), RenderError> {
        let mut state = self.lock()?;
        state.offers.clear();
        state.offers_visible = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_ignored_until_active_screen_exists() {
        let renderer = HeadlessRenderer::new();
        renderer.set_field(Field::DriverName, "A").expect("set");
        renderer.set_call_link(Some("+92300")).expect("link");
        let snapshot = renderer.snapshot().expect("snapshot");
        assert_eq!(snapshot.field(Field::DriverName), None);
        assert_eq!(snapshot.call_link, None);

        renderer.ensure_screen(Screen::Active).expect("ensure");
        renderer.ensure_screen(Screen::Active).expect("ensure twice");
        renderer.set_field(Field::DriverName, "A").expect("set");
        renderer.set_call_link(Some("+92300")).expect("link");
        renderer.set_call_link(None).expect("no-op");
        let snapshot = renderer.snapshot().expect("snapshot");
        assert_eq!(snapshot.field(Field::DriverName), Some("A"));
        assert_eq!(snapshot.call_link.as_deref(), Some("tel:+92300"));
    }

    #[test]
    fn showing_unbuilt_screen_is_reported() {
        let renderer = HeadlessRenderer::new();
        assert!(matches!(
            renderer.show_screen(Screen::Active),
            Err(RenderError::MissingScreen(Screen::Active))
        ));
        assert_eq!(
            renderer.snapshot().expect("snapshot").visible,
            Some(Screen::Booking)
        );
    }

    #[test]
    fn show_screen_is_exclusive_and_idempotent() {
        let renderer = HeadlessRenderer::new();
        renderer.show_screen(Screen::Waiting).expect("show");
        renderer.show_screen(Screen::Waiting).expect("show again");
        assert_eq!(
            renderer.snapshot().expect("snapshot").visible,
            Some(Screen::Waiting)
        );
    }
}
