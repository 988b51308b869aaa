use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::models::{Sticker, StickerId};

/// Backend command surface. Commands acting on "the current sticker" are addressed by
/// the calling window's label, which is the sticker id.
#[async_trait]
pub trait StickerBackend: Send + Sync {
    async fn new_sticker(&self) -> Result<(), BackendError>;
    async fn load_sticker(&self, window: &str) -> Result<Sticker, BackendError>;
    async fn save_sticker_markdown(&self, window: &str, markdown: &str)
        -> Result<(), BackendError>;
    async fn save_sticker_color(&self, window: &str, color: &str) -> Result<(), BackendError>;
    async fn toggle_sticker_pinned(&self, window: &str) -> Result<(), BackendError>;
    async fn remove_sticker(&self, window: &str) -> Result<(), BackendError>;
    async fn load_trashbox_stickers(&self) -> Result<Vec<Sticker>, BackendError>;
    /// Ids that are not in the trash are skipped.
    async fn delete_stickers(&self, ids: &[StickerId]) -> Result<(), BackendError>;
    /// Ids that are not in the trash are skipped.
    async fn recover_stickers(&self, ids: &[StickerId]) -> Result<(), BackendError>;
    async fn open_url(&self, url: &str) -> Result<(), BackendError>;
}

/// Typed façade over [`StickerBackend`] bound to one window. It never publishes on the
/// window bus; callers broadcast after a structural call succeeds.
#[derive(Clone)]
pub struct RecordClient {
    backend: Arc<dyn StickerBackend>,
    window: String,
}

impl RecordClient {
    pub fn new(backend: Arc<dyn StickerBackend>, window: impl Into<String>) -> Self {
        Self {
            backend,
            window: window.into(),
        }
    }

    pub fn window(&self) -> &str {
        &self.window
    }

    /// Allocates a sticker and its window. The new id is not reported back; the new
    /// window loads its own state.
    pub async fn create(&self) -> Result<(), BackendError> {
        log::debug!("create sticker from window={}", self.window);
        self.backend.new_sticker().await
    }

    pub async fn load_current(&self) -> Result<Sticker, BackendError> {
        self.backend.load_sticker(&self.window).await
    }

    pub async fn save_markdown(&self, text: &str) -> Result<(), BackendError> {
        self.backend.save_sticker_markdown(&self.window, text).await
    }

    pub async fn save_color(&self, color: &str) -> Result<(), BackendError> {
        self.backend.save_sticker_color(&self.window, color).await
    }

    pub async fn toggle_pinned(&self) -> Result<(), BackendError> {
        self.backend.toggle_sticker_pinned(&self.window).await
    }

    pub async fn remove(&self) -> Result<(), BackendError> {
        log::debug!("remove sticker window={}", self.window);
        self.backend.remove_sticker(&self.window).await
    }

    pub async fn load_trash(&self) -> Result<Vec<Sticker>, BackendError> {
        self.backend.load_trashbox_stickers().await
    }

    pub async fn delete_many(&self, ids: &[StickerId]) -> Result<(), BackendError> {
        log::debug!("delete stickers count={}", ids.len());
        self.backend.delete_stickers(ids).await
    }

    pub async fn recover_many(&self, ids: &[StickerId]) -> Result<(), BackendError> {
        log::debug!("recover stickers count={}", ids.len());
        self.backend.recover_stickers(ids).await
    }

    pub async fn open_external(&self, url: &str) -> Result<(), BackendError> {
        self.backend.open_url(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn calls_are_addressed_by_window_label() {
        let backend = Arc::new(FakeBackend::with_stickers(vec![Sticker::new("w1", "", 1)]));
        let client = RecordClient::new(backend.clone(), "w1");

        client.save_markdown("# Hi").await.unwrap();
        client.save_color("#fff").await.unwrap();
        client.toggle_pinned().await.unwrap();

        let sticker = client.load_current().await.unwrap();
        assert_eq!(sticker.markdown, "# Hi");
        assert_eq!(sticker.color, "#fff");
        assert!(sticker.pinned);
        assert_eq!(
            backend.calls(),
            vec![
                "save_markdown w1 # Hi".to_string(),
                "save_color w1 #fff".to_string(),
                "toggle_pinned w1".to_string(),
                "load w1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_window_surfaces_not_found() {
        let backend = Arc::new(FakeBackend::default());
        let client = RecordClient::new(backend, "ghost");
        let err = client.load_current().await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn batch_operations_are_idempotent() {
        let backend = Arc::new(FakeBackend::with_stickers(vec![
            Sticker::new("a", "", 1),
            Sticker::new("b", "", 1),
            Sticker::new("c", "", 1),
        ]));
        RecordClient::new(backend.clone(), "a").remove().await.unwrap();
        RecordClient::new(backend.clone(), "b").remove().await.unwrap();
        let trash = RecordClient::new(backend.clone(), "trashbox");

        let ids = vec!["a".to_string(), "b".to_string()];
        trash.recover_many(&ids[..1]).await.unwrap();
        let once = backend.snapshot();
        trash.recover_many(&ids[..1]).await.unwrap();
        assert_eq!(backend.snapshot(), once);

        trash.delete_many(&ids).await.unwrap();
        let once = backend.snapshot();
        trash.delete_many(&ids).await.unwrap();
        assert_eq!(backend.snapshot(), once);

        let remaining: Vec<_> = once.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(remaining, vec!["a", "c"]);
        assert!(trash.load_trash().await.unwrap().is_empty());
    }
}
