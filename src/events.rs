use crate::models::Sticker;

/// Published by a freshly opened sticker window that wants its state pushed to it.
pub const EVENT_INIT_REQUEST: &str = "init-request";
/// Answer to [`EVENT_INIT_REQUEST`], addressed to the requesting window only.
pub const EVENT_INIT_RESPONSE: &str = "init-response";
/// Invalidation signal: receivers drop their cached view and load again.
pub const EVENT_RELOAD: &str = "reload";

/// Source label used when the host process (tray, startup) publishes on the bus.
pub const HOST_SOURCE: &str = "host";

/// State pushed through the init handshake. Accepts a full [`Sticker`] too; unknown
/// fields are ignored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InitPayload {
    pub markdown: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub pinned: bool,
}

impl From<&Sticker> for InitPayload {
    fn from(sticker: &Sticker) -> Self {
        Self {
            markdown: sticker.markdown.clone(),
            color: sticker.color.clone(),
            pinned: sticker.pinned,
        }
    }
}
