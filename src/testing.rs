//! In-memory backend shared by the session and trash tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::StickerBackend;
use crate::error::BackendError;
use crate::models::{Sticker, StickerId};

#[derive(Default)]
struct FakeData {
    stickers: Vec<Sticker>,
    calls: Vec<String>,
    opened: Vec<String>,
    failing: bool,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeBackend {
    inner: Mutex<FakeData>,
}

impl FakeBackend {
    pub fn with_stickers(stickers: Vec<Sticker>) -> Self {
        Self {
            inner: Mutex::new(FakeData {
                stickers,
                ..FakeData::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn snapshot(&self) -> Vec<Sticker> {
        self.inner.lock().unwrap().stickers.clone()
    }

    pub fn sticker(&self, id: &str) -> Option<Sticker> {
        self.snapshot().into_iter().find(|sticker| sticker.id == id)
    }

    pub fn opened_windows(&self) -> Vec<String> {
        self.inner.lock().unwrap().opened.clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    fn record(&self, call: String) -> Result<std::sync::MutexGuard<'_, FakeData>, BackendError> {
        let mut guard = self.inner.lock().unwrap();
        guard.calls.push(call);
        if guard.failing {
            return Err(BackendError::Command("backend offline".to_string()));
        }
        Ok(guard)
    }
}

fn find<'a>(data: &'a mut FakeData, id: &str) -> Result<&'a mut Sticker, BackendError> {
    data.stickers
        .iter_mut()
        .find(|sticker| sticker.id == id)
        .ok_or_else(|| BackendError::NotFound(id.to_string()))
}

#[async_trait]
impl StickerBackend for FakeBackend {
    async fn new_sticker(&self) -> Result<(), BackendError> {
        let mut data = self.record("new_sticker".to_string())?;
        data.next_id += 1;
        let id = format!("sticker-{}", data.next_id);
        data.stickers.push(Sticker::new(id.clone(), "", 0));
        data.opened.push(id);
        Ok(())
    }

    async fn load_sticker(&self, window: &str) -> Result<Sticker, BackendError> {
        let mut data = self.record(format!("load {window}"))?;
        find(&mut data, window).map(|sticker| sticker.clone())
    }

    async fn save_sticker_markdown(
        &self,
        window: &str,
        markdown: &str,
    ) -> Result<(), BackendError> {
        let mut data = self.record(format!("save_markdown {window} {markdown}"))?;
        find(&mut data, window)?.markdown = markdown.to_string();
        Ok(())
    }

    async fn save_sticker_color(&self, window: &str, color: &str) -> Result<(), BackendError> {
        let mut data = self.record(format!("save_color {window} {color}"))?;
        find(&mut data, window)?.color = color.to_string();
        Ok(())
    }

    async fn toggle_sticker_pinned(&self, window: &str) -> Result<(), BackendError> {
        let mut data = self.record(format!("toggle_pinned {window}"))?;
        let sticker = find(&mut data, window)?;
        sticker.pinned = !sticker.pinned;
        Ok(())
    }

    async fn remove_sticker(&self, window: &str) -> Result<(), BackendError> {
        let mut data = self.record(format!("remove {window}"))?;
        find(&mut data, window)?.archived = true;
        Ok(())
    }

    async fn load_trashbox_stickers(&self) -> Result<Vec<Sticker>, BackendError> {
        let data = self.record("load_trash".to_string())?;
        Ok(data
            .stickers
            .iter()
            .filter(|sticker| sticker.archived)
            .cloned()
            .collect())
    }

    async fn delete_stickers(&self, ids: &[StickerId]) -> Result<(), BackendError> {
        let mut data = self.record(format!("delete {}", ids.join(",")))?;
        data.stickers
            .retain(|sticker| !(sticker.archived && ids.contains(&sticker.id)));
        Ok(())
    }

    async fn recover_stickers(&self, ids: &[StickerId]) -> Result<(), BackendError> {
        let mut data = self.record(format!("recover {}", ids.join(",")))?;
        let mut recovered = Vec::new();
        for sticker in data.stickers.iter_mut() {
            if sticker.archived && ids.contains(&sticker.id) {
                sticker.archived = false;
                recovered.push(sticker.id.clone());
            }
        }
        data.opened.extend(recovered);
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<(), BackendError> {
        let _data = self.record(format!("open_url {url}"))?;
        Ok(())
    }
}
