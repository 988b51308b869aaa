//! [`WindowBus`] over Tauri's global event system.
//!
//! Envelopes are emitted under their topic name so webviews can listen with the plain
//! event API and filter on `target` themselves. Rust-side listeners do that filtering here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tauri::{AppHandle, Emitter, EventId, Listener, Runtime};

use crate::error::SyncError;
use crate::sync::{BusEvent, Handler, ListenerId, WindowBus};

/// Managed handle to the app's bus.
#[derive(Clone)]
pub struct SharedBus(pub Arc<dyn WindowBus>);

pub struct TauriBus<R: Runtime> {
    app: AppHandle<R>,
    listeners: Arc<Mutex<HashMap<ListenerId, EventId>>>,
    next_id: AtomicU64,
}

impl<R: Runtime> TauriBus<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self {
            app,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn register(&self, window: &str, topic: &str, handler: Handler, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let window = window.to_string();
        let fired = AtomicBool::new(false);
        let app = self.app.clone();
        let listeners = self.listeners.clone();

        let event_id = self.app.listen_any(topic, move |event| {
            let envelope: BusEvent = match serde_json::from_str(event.payload()) {
                Ok(envelope) => envelope,
                Err(err) => {
                    log::warn!("bus: dropping malformed envelope window={window} err={err}");
                    return;
                }
            };
            if !envelope.target.includes(&window) {
                return;
            }
            if once {
                if fired.swap(true, Ordering::SeqCst) {
                    return;
                }
                let removed = listeners.lock().expect("bus poisoned").remove(&id);
                if let Some(event_id) = removed {
                    app.unlisten(event_id);
                }
            }
            handler(&envelope);
        });

        self.listeners
            .lock()
            .expect("bus poisoned")
            .insert(id, event_id);
        id
    }
}

impl<R: Runtime> WindowBus for TauriBus<R> {
    fn publish(&self, event: BusEvent) -> Result<(), SyncError> {
        let topic = event.topic.clone();
        self.app
            .emit(&topic, event)
            .map_err(|err| SyncError::Emit(err.to_string()))
    }

    fn listen(&self, window: &str, topic: &str, handler: Handler) -> ListenerId {
        self.register(window, topic, handler, false)
    }

    fn once(&self, window: &str, topic: &str, handler: Handler) -> ListenerId {
        self.register(window, topic, handler, true)
    }

    fn unlisten(&self, id: ListenerId) {
        let removed = self.listeners.lock().expect("bus poisoned").remove(&id);
        if let Some(event_id) = removed {
            self.app.unlisten(event_id);
        }
    }
}
