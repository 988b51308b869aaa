//! Controller behind one sticker window.
//!
//! Edits are applied to the local copy first and persisted afterwards. A failed call leaves
//! the local copy as it is; the next load (on mount or on a reload broadcast) replaces it
//! wholesale with whatever the backend holds.

use std::sync::Arc;
use std::time::Duration;

use crate::client::RecordClient;
use crate::error::BackendError;
use crate::events::InitPayload;
use crate::models::Sticker;
use crate::sync::{
    broadcast_reload, request_init, subscribe_reload, ReloadSignal, Subscription, WindowBus,
};

/// Outcome of the most recent persistence call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistState {
    Confirmed,
    Pending,
    Failed,
}

pub struct StickerSession {
    client: RecordClient,
    bus: Arc<dyn WindowBus>,
    reloads: ReloadSignal,
    _reload_subscription: Subscription,
    markdown: String,
    color: String,
    pinned: bool,
    editing: bool,
    persist: PersistState,
}

impl StickerSession {
    /// Subscribes to reload broadcasts, then pulls the window's sticker.
    pub async fn mount(client: RecordClient, bus: Arc<dyn WindowBus>) -> Result<Self, BackendError> {
        let mut session = Self::subscribed(client, bus);
        session.reload().await?;
        Ok(session)
    }

    /// Waits for state pushed through the init handshake, falling back to a pull when the
    /// handshake fails or times out.
    pub async fn mount_with_handshake(
        client: RecordClient,
        bus: Arc<dyn WindowBus>,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let mut session = Self::subscribed(client, bus);
        match request_init(&session.bus, session.client.window(), timeout).await {
            Ok(payload) => session.apply(payload),
            Err(err) => {
                log::info!(
                    "init handshake failed window={} err={err}; loading instead",
                    session.client.window()
                );
                session.reload().await?;
            }
        }
        Ok(session)
    }

    fn subscribed(client: RecordClient, bus: Arc<dyn WindowBus>) -> Self {
        let (subscription, reloads) = subscribe_reload(&bus, client.window());
        Self {
            client,
            bus,
            reloads,
            _reload_subscription: subscription,
            markdown: String::new(),
            color: String::new(),
            pinned: false,
            editing: false,
            persist: PersistState::Confirmed,
        }
    }

    pub fn window(&self) -> &str {
        self.client.window()
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn editing(&self) -> bool {
        self.editing
    }

    pub fn persist_state(&self) -> PersistState {
        self.persist
    }

    /// Replaces the local markdown without persisting (editor keystrokes).
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.markdown = text.into();
    }

    /// Leaving edit mode saves the current markdown; entering it saves nothing.
    pub async fn toggle_edit(&mut self) -> Result<(), BackendError> {
        self.editing = !self.editing;
        if self.editing {
            return Ok(());
        }
        self.persist = PersistState::Pending;
        let result = self.client.save_markdown(&self.markdown).await;
        self.settle("save_markdown", result)
    }

    pub async fn toggle_pin(&mut self) -> Result<(), BackendError> {
        self.pinned = !self.pinned;
        self.persist = PersistState::Pending;
        let result = self.client.toggle_pinned().await;
        self.settle("toggle_pinned", result)?;
        self.announce();
        Ok(())
    }

    pub async fn set_color(&mut self, color: &str) -> Result<(), BackendError> {
        self.color = color.to_string();
        self.persist = PersistState::Pending;
        let result = self.client.save_color(color).await;
        self.settle("save_color", result)
    }

    /// Flips a task item found by its rendered label and saves right away, in view mode too.
    pub async fn toggle_task(&mut self, label: &str, checked: bool) -> Result<(), BackendError> {
        self.markdown = crate::markdown::toggle_task(&self.markdown, label, checked);
        self.persist = PersistState::Pending;
        let result = self.client.save_markdown(&self.markdown).await;
        self.settle("save_markdown", result)
    }

    /// Moves this sticker to the trash. Closing the window is up to the host.
    pub async fn remove(&mut self) -> Result<(), BackendError> {
        self.persist = PersistState::Pending;
        let result = self.client.remove().await;
        self.settle("remove", result)?;
        self.announce();
        Ok(())
    }

    /// Asks the backend for a new sticker window; this window's state is untouched.
    pub async fn create_sticker(&mut self) -> Result<(), BackendError> {
        self.client.create().await?;
        self.announce();
        Ok(())
    }

    pub async fn open_link(&self, url: &str) -> Result<(), BackendError> {
        let result = self.client.open_external(url).await;
        if let Err(err) = &result {
            log::warn!("open link failed window={} err={err}", self.window());
        }
        result
    }

    /// Pulls the sticker again and replaces every persisted field, dropping unsaved edits.
    pub async fn reload(&mut self) -> Result<(), BackendError> {
        let sticker = self.client.load_current().await?;
        self.apply_sticker(&sticker);
        self.persist = PersistState::Confirmed;
        Ok(())
    }

    /// Handles reload broadcasts queued since the last call. Several queued broadcasts
    /// collapse into one load. Returns whether a load happened.
    pub async fn process_reloads(&mut self) -> Result<bool, BackendError> {
        if self.reloads.drain() == 0 {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    /// Waits for the next reload broadcast and handles it. `None` once the bus is gone.
    pub async fn next_reload(&mut self) -> Option<Result<(), BackendError>> {
        self.reloads.recv().await?;
        Some(self.reload().await)
    }

    fn apply(&mut self, payload: InitPayload) {
        self.markdown = payload.markdown;
        self.color = payload.color;
        self.pinned = payload.pinned;
    }

    fn apply_sticker(&mut self, sticker: &Sticker) {
        self.apply(InitPayload::from(sticker));
    }

    fn settle(&mut self, op: &str, result: Result<(), BackendError>) -> Result<(), BackendError> {
        match &result {
            Ok(()) => self.persist = PersistState::Confirmed,
            Err(err) => {
                self.persist = PersistState::Failed;
                log::warn!("persist failed window={} op={op} err={err}", self.window());
            }
        }
        result
    }

    fn announce(&self) {
        if let Err(err) = broadcast_reload(self.bus.as_ref(), self.window()) {
            log::warn!("reload broadcast failed window={} err={err}", self.window());
        }
    }
}
