//! Controller behind the trash box window.
//!
//! The trashed stickers are owned by the backend; the checked selection only exists here,
//! kept in a separate set keyed by id and cleared on every load.

use std::collections::HashSet;
use std::sync::Arc;

use crate::client::RecordClient;
use crate::error::BackendError;
use crate::models::{Sticker, StickerId};
use crate::sync::{broadcast_reload, subscribe_reload, ReloadSignal, Subscription, WindowBus};

pub const TRASHBOX_WINDOW: &str = "trashbox";

/// A trashed sticker as listed in the trash box, with its local selection flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrashEntry<'a> {
    pub sticker: &'a Sticker,
    pub checked: bool,
}

pub struct TrashBatchController {
    client: RecordClient,
    bus: Arc<dyn WindowBus>,
    reloads: ReloadSignal,
    _reload_subscription: Subscription,
    stickers: Vec<Sticker>,
    checked: HashSet<StickerId>,
}

impl TrashBatchController {
    pub async fn mount(client: RecordClient, bus: Arc<dyn WindowBus>) -> Result<Self, BackendError> {
        let (subscription, reloads) = subscribe_reload(&bus, client.window());
        let mut controller = Self {
            client,
            bus,
            reloads,
            _reload_subscription: subscription,
            stickers: Vec::new(),
            checked: HashSet::new(),
        };
        controller.load().await?;
        Ok(controller)
    }

    /// Replaces the list with the backend's trash and clears the selection.
    pub async fn load(&mut self) -> Result<(), BackendError> {
        let stickers = self.client.load_trash().await?;
        self.stickers = stickers;
        self.checked.clear();
        Ok(())
    }

    pub fn entries(&self) -> Vec<TrashEntry<'_>> {
        self.stickers
            .iter()
            .map(|sticker| TrashEntry {
                sticker,
                checked: self.checked.contains(&sticker.id),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stickers.is_empty()
    }

    /// Checked ids in list order.
    pub fn checked_ids(&self) -> Vec<StickerId> {
        self.stickers
            .iter()
            .filter(|sticker| self.checked.contains(&sticker.id))
            .map(|sticker| sticker.id.clone())
            .collect()
    }

    pub fn all_checked(&self) -> bool {
        self.stickers
            .iter()
            .all(|sticker| self.checked.contains(&sticker.id))
    }

    /// Flips one entry. Returns `false` when the id is not listed.
    pub fn toggle_one(&mut self, id: &str) -> bool {
        if !self.stickers.iter().any(|sticker| sticker.id == id) {
            return false;
        }
        if !self.checked.remove(id) {
            self.checked.insert(id.to_string());
        }
        true
    }

    /// Unchecks everything when everything is checked, otherwise checks everything.
    pub fn toggle_all(&mut self) {
        if self.all_checked() {
            self.checked.clear();
            return;
        }
        self.checked = self
            .stickers
            .iter()
            .map(|sticker| sticker.id.clone())
            .collect();
    }

    /// Permanently deletes the checked stickers. They leave the local list before the
    /// backend answers. Returns the ids sent.
    pub async fn commit_delete(&mut self) -> Result<Vec<StickerId>, BackendError> {
        let ids = self.take_checked();
        if ids.is_empty() {
            return Ok(ids);
        }
        if let Err(err) = self.client.delete_many(&ids).await {
            log::warn!("trash delete failed count={} err={err}", ids.len());
            return Err(err);
        }
        self.announce();
        Ok(ids)
    }

    /// Restores the checked stickers to live windows. They leave the local list before the
    /// backend answers. Returns the ids sent.
    pub async fn commit_recover(&mut self) -> Result<Vec<StickerId>, BackendError> {
        let ids = self.take_checked();
        if ids.is_empty() {
            return Ok(ids);
        }
        if let Err(err) = self.client.recover_many(&ids).await {
            log::warn!("trash recover failed count={} err={err}", ids.len());
            return Err(err);
        }
        self.announce();
        Ok(ids)
    }

    /// Handles reload broadcasts queued since the last call with a single load.
    pub async fn process_reloads(&mut self) -> Result<bool, BackendError> {
        if self.reloads.drain() == 0 {
            return Ok(false);
        }
        self.load().await?;
        Ok(true)
    }

    /// Waits for the next reload broadcast and handles it. `None` once the bus is gone.
    pub async fn next_reload(&mut self) -> Option<Result<(), BackendError>> {
        self.reloads.recv().await?;
        Some(self.load().await)
    }

    fn take_checked(&mut self) -> Vec<StickerId> {
        let ids = self.checked_ids();
        let checked = std::mem::take(&mut self.checked);
        self.stickers.retain(|sticker| !checked.contains(&sticker.id));
        ids
    }

    fn announce(&self) {
        if let Err(err) = broadcast_reload(self.bus.as_ref(), self.client.window()) {
            log::warn!("reload broadcast failed window={} err={err}", self.client.window());
        }
    }
}
