use std::sync::{Arc, Mutex};

use crate::models::{
    Settings, SettingsFile, Sticker, StickerId, StickersFile, Timestamp, WindowBounds,
};

const SCHEMA_VERSION: u32 = 1;

/// The backend's sticker table. Every window-facing command goes through it; storage only
/// ever sees full snapshots of it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<AppData>>,
}

impl AppState {
    pub fn new(stickers: Vec<Sticker>, settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AppData { stickers, settings })),
        }
    }

    pub fn stickers_file(&self) -> StickersFile {
        let guard = self.inner.lock().expect("state poisoned");
        StickersFile {
            schema_version: SCHEMA_VERSION,
            stickers: guard.stickers.clone(),
        }
    }

    pub fn settings_file(&self) -> SettingsFile {
        let guard = self.inner.lock().expect("state poisoned");
        SettingsFile {
            schema_version: SCHEMA_VERSION,
            settings: guard.settings.clone(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Sticker> {
        let guard = self.inner.lock().expect("state poisoned");
        guard.stickers.iter().find(|s| s.id == id).cloned()
    }

    /// Stickers that currently own a window, in id order.
    pub fn live(&self) -> Vec<Sticker> {
        let guard = self.inner.lock().expect("state poisoned");
        let mut live: Vec<Sticker> = guard.stickers.iter().filter(|s| !s.archived).cloned().collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));
        live
    }

    /// Trashed stickers, most recently touched first.
    pub fn archived(&self) -> Vec<Sticker> {
        let guard = self.inner.lock().expect("state poisoned");
        let mut archived: Vec<Sticker> =
            guard.stickers.iter().filter(|s| s.archived).cloned().collect();
        archived.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        archived
    }

    pub fn insert(&self, sticker: Sticker) {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.stickers.push(sticker);
    }

    pub fn remove(&self, id: &str) {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.stickers.retain(|s| s.id != id);
    }

    pub fn update_markdown(&self, id: &str, markdown: &str, now: Timestamp) -> bool {
        self.modify(id, now, |sticker| sticker.markdown = markdown.to_string())
    }

    pub fn update_color(&self, id: &str, color: &str, now: Timestamp) -> bool {
        self.modify(id, now, |sticker| sticker.color = color.to_string())
    }

    pub fn update_bounds(&self, id: &str, bounds: WindowBounds, now: Timestamp) -> bool {
        self.modify(id, now, |sticker| sticker.bounds = Some(bounds))
    }

    /// Moves the window origin, keeping the stored size. Returns `false` for unknown ids.
    pub fn update_position(&self, id: &str, x: f64, y: f64, default: &WindowBounds, now: Timestamp) -> bool {
        self.modify(id, now, |sticker| {
            let bounds = sticker.bounds.get_or_insert_with(|| default.clone());
            bounds.x = x;
            bounds.y = y;
        })
    }

    /// Resizes the window, keeping the stored origin. Returns `false` for unknown ids.
    pub fn update_size(&self, id: &str, width: f64, height: f64, default: &WindowBounds, now: Timestamp) -> bool {
        self.modify(id, now, |sticker| {
            let bounds = sticker.bounds.get_or_insert_with(|| default.clone());
            bounds.width = width;
            bounds.height = height;
        })
    }

    /// Returns the new pinned state.
    pub fn toggle_pinned(&self, id: &str, now: Timestamp) -> Option<bool> {
        let mut pinned = None;
        self.modify(id, now, |sticker| {
            sticker.pinned = !sticker.pinned;
            pinned = Some(sticker.pinned);
        });
        pinned
    }

    pub fn archive(&self, id: &str, now: Timestamp) -> bool {
        self.modify(id, now, |sticker| sticker.archived = true)
    }

    /// Drops trashed stickers with the given ids; live or unknown ids are left alone.
    /// Returns how many were dropped.
    pub fn delete_archived(&self, ids: &[StickerId]) -> usize {
        let mut guard = self.inner.lock().expect("state poisoned");
        let before = guard.stickers.len();
        guard
            .stickers
            .retain(|s| !(s.archived && ids.contains(&s.id)));
        before - guard.stickers.len()
    }

    /// Brings trashed stickers back to life and returns them; live or unknown ids are
    /// left alone.
    pub fn recover(&self, ids: &[StickerId], now: Timestamp) -> Vec<Sticker> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let mut recovered = Vec::new();
        for sticker in guard.stickers.iter_mut() {
            if sticker.archived && ids.contains(&sticker.id) {
                sticker.archived = false;
                sticker.updated_at = now;
                recovered.push(sticker.clone());
            }
        }
        recovered
    }

    pub fn settings(&self) -> Settings {
        let guard = self.inner.lock().expect("state poisoned");
        guard.settings.clone()
    }

    fn modify(&self, id: &str, now: Timestamp, change: impl FnOnce(&mut Sticker)) -> bool {
        let mut guard = self.inner.lock().expect("state poisoned");
        match guard.stickers.iter_mut().find(|s| s.id == id) {
            Some(sticker) => {
                change(sticker);
                sticker.updated_at = now;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug)]
struct AppData {
    stickers: Vec<Sticker>,
    settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sticker(id: &str, updated_at: i64, archived: bool) -> Sticker {
        let mut sticker = Sticker::new(id, "", 1);
        sticker.updated_at = updated_at;
        sticker.archived = archived;
        sticker
    }

    fn ids(stickers: &[Sticker]) -> Vec<&str> {
        stickers.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn files_include_schema_version() {
        let state = AppState::new(vec![make_sticker("a", 1, false)], Settings::default());
        let file = state.stickers_file();
        assert_eq!(file.schema_version, SCHEMA_VERSION);
        assert_eq!(file.stickers.len(), 1);
        assert_eq!(state.settings_file().schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn live_and_archived_are_partitioned_and_ordered() {
        let state = AppState::new(
            vec![
                make_sticker("c", 5, false),
                make_sticker("x", 10, true),
                make_sticker("a", 5, false),
                make_sticker("y", 30, true),
                make_sticker("w", 10, true),
            ],
            Settings::default(),
        );
        assert_eq!(ids(&state.live()), vec!["a", "c"]);
        assert_eq!(ids(&state.archived()), vec!["y", "w", "x"]);
    }

    #[test]
    fn field_updates_bump_updated_at_and_report_missing_ids() {
        let state = AppState::new(vec![make_sticker("a", 1, false)], Settings::default());
        assert!(state.update_markdown("a", "# Hi", 10));
        assert!(state.update_color("a", "#fff", 11));
        assert_eq!(state.toggle_pinned("a", 12), Some(true));
        assert_eq!(state.toggle_pinned("a", 13), Some(false));
        let sticker = state.get("a").unwrap();
        assert_eq!(sticker.markdown, "# Hi");
        assert_eq!(sticker.color, "#fff");
        assert_eq!(sticker.updated_at, 13);

        assert!(!state.update_markdown("missing", "x", 1));
        assert_eq!(state.toggle_pinned("missing", 1), None);
    }

    #[test]
    fn position_and_size_fill_missing_bounds_from_default() {
        let state = AppState::new(vec![make_sticker("a", 1, false)], Settings::default());
        let default = WindowBounds::sized(500.0, 400.0);
        assert!(state.update_position("a", 30.0, 40.0, &default, 2));
        assert!(state.update_size("a", 320.0, 240.0, &default, 3));
        assert_eq!(
            state.get("a").unwrap().bounds,
            Some(WindowBounds {
                x: 30.0,
                y: 40.0,
                width: 320.0,
                height: 240.0
            })
        );
        assert!(!state.update_size("trashbox", 1.0, 1.0, &default, 4));
    }

    #[test]
    fn delete_and_recover_only_touch_trashed_ids() {
        let state = AppState::new(
            vec![
                make_sticker("live", 1, false),
                make_sticker("t1", 1, true),
                make_sticker("t2", 1, true),
            ],
            Settings::default(),
        );
        let request = vec!["live".to_string(), "t1".to_string(), "ghost".to_string()];
        assert_eq!(state.delete_archived(&request), 1);
        assert_eq!(state.delete_archived(&request), 0);
        assert!(state.get("live").is_some());

        let recovered = state.recover(&["t2".to_string(), "live".to_string()], 50);
        assert_eq!(ids(&recovered), vec!["t2"]);
        assert!(state.recover(&["t2".to_string()], 60).is_empty());
        assert_eq!(state.get("t2").unwrap().updated_at, 50);
        assert!(state.archived().is_empty());
    }

    #[test]
    fn archive_and_remove() {
        let state = AppState::new(vec![make_sticker("a", 1, false)], Settings::default());
        assert!(state.archive("a", 9));
        assert_eq!(ids(&state.archived()), vec!["a"]);
        state.remove("a");
        assert!(state.get("a").is_none());
        assert!(!state.archive("a", 10));
    }
}
