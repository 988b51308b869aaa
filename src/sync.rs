//! Window bus shared by every window of the running app.
//!
//! The bus carries invalidation signals and the one-shot init handshake; it never carries
//! the authoritative sticker data. Delivery is synchronous and in publish order, and a
//! listener only sees events published after it registered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::SyncError;
use crate::events::{
    InitPayload, EVENT_INIT_REQUEST, EVENT_INIT_RESPONSE, EVENT_RELOAD, HOST_SOURCE,
};
use crate::models::Sticker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum EventTarget {
    All,
    AllExcept(String),
    Window(String),
}

impl EventTarget {
    pub fn includes(&self, window: &str) -> bool {
        match self {
            EventTarget::All => true,
            EventTarget::AllExcept(label) => label != window,
            EventTarget::Window(label) => label == window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub topic: String,
    pub source: String,
    pub target: EventTarget,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl BusEvent {
    pub fn new(
        topic: &str,
        source: &str,
        target: EventTarget,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            source: source.to_string(),
            target,
            payload,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

pub type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Publish/subscribe surface every window talks through. Listeners are registered on
/// behalf of a window label and only receive events whose target includes that label.
pub trait WindowBus: Send + Sync {
    fn publish(&self, event: BusEvent) -> Result<(), SyncError>;
    fn listen(&self, window: &str, topic: &str, handler: Handler) -> ListenerId;
    /// Like [`WindowBus::listen`] but torn down after the first delivered event.
    fn once(&self, window: &str, topic: &str, handler: Handler) -> ListenerId;
    fn unlisten(&self, id: ListenerId);
}

/// Owns one listener registration; dropping it unsubscribes.
pub struct Subscription {
    bus: Arc<dyn WindowBus>,
    id: Option<ListenerId>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(id) = self.id.take() {
            self.bus.unlisten(id);
        }
    }

    /// Leaves the listener registered for the bus lifetime. Used for one-shot listeners
    /// that remove themselves.
    pub fn detach(mut self) {
        self.id = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.bus.unlisten(id);
        }
    }
}

pub fn subscribe(
    bus: &Arc<dyn WindowBus>,
    window: &str,
    topic: &str,
    handler: Handler,
) -> Subscription {
    let id = bus.listen(window, topic, handler);
    Subscription {
        bus: bus.clone(),
        id: Some(id),
    }
}

pub fn subscribe_once(
    bus: &Arc<dyn WindowBus>,
    window: &str,
    topic: &str,
    handler: Handler,
) -> Subscription {
    let id = bus.once(window, topic, handler);
    Subscription {
        bus: bus.clone(),
        id: Some(id),
    }
}

struct Listener {
    id: ListenerId,
    window: String,
    topic: String,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct BusData {
    listeners: Vec<Listener>,
}

/// In-process bus. Handlers run on the publishing thread, outside the bus lock, so a
/// handler may publish again.
#[derive(Clone, Default)]
pub struct LocalBus {
    inner: Arc<Mutex<BusData>>,
    next_id: Arc<AtomicU64>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        let guard = self.inner.lock().expect("bus poisoned");
        guard.listeners.len()
    }

    fn register(&self, window: &str, topic: &str, handler: Handler, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.inner.lock().expect("bus poisoned");
        guard.listeners.push(Listener {
            id,
            window: window.to_string(),
            topic: topic.to_string(),
            once,
            handler,
        });
        id
    }
}

impl WindowBus for LocalBus {
    fn publish(&self, event: BusEvent) -> Result<(), SyncError> {
        let handlers: Vec<Handler> = {
            let mut guard = self.inner.lock().expect("bus poisoned");
            let mut matched = Vec::new();
            guard.listeners.retain(|listener| {
                let hit = listener.topic == event.topic && event.target.includes(&listener.window);
                if hit {
                    matched.push(listener.handler.clone());
                }
                !(hit && listener.once)
            });
            matched
        };
        log::trace!(
            "bus publish topic={} source={} listeners={}",
            event.topic,
            event.source,
            handlers.len()
        );
        for handler in handlers {
            handler(&event);
        }
        Ok(())
    }

    fn listen(&self, window: &str, topic: &str, handler: Handler) -> ListenerId {
        self.register(window, topic, handler, false)
    }

    fn once(&self, window: &str, topic: &str, handler: Handler) -> ListenerId {
        self.register(window, topic, handler, true)
    }

    fn unlisten(&self, id: ListenerId) {
        let mut guard = self.inner.lock().expect("bus poisoned");
        guard.listeners.retain(|listener| listener.id != id);
    }
}

/// Tells every window except `source` that its cached view is stale.
pub fn broadcast_reload(bus: &dyn WindowBus, source: &str) -> Result<(), SyncError> {
    bus.publish(BusEvent::new(
        EVENT_RELOAD,
        source,
        EventTarget::AllExcept(source.to_string()),
        serde_json::Value::Null,
    ))
}

/// Queue of reload signals received by one window.
pub struct ReloadSignal {
    rx: mpsc::UnboundedReceiver<()>,
}

impl ReloadSignal {
    /// Consumes every queued signal without waiting and returns how many there were.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    /// Waits for at least one signal, then drains the rest. `None` once the bus side is gone.
    pub async fn recv(&mut self) -> Option<usize> {
        self.rx.recv().await?;
        Some(1 + self.drain())
    }
}

/// Subscribes `window` to reload broadcasts for as long as the returned subscription lives.
pub fn subscribe_reload(bus: &Arc<dyn WindowBus>, window: &str) -> (Subscription, ReloadSignal) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: Handler = Arc::new(move |_event: &BusEvent| {
        let _ = tx.send(());
    });
    let subscription = subscribe(bus, window, EVENT_RELOAD, handler);
    (subscription, ReloadSignal { rx })
}

/// Asks for `window`'s initial state and waits for the single matching response.
/// The response listener is registered before the request goes out.
pub async fn request_init(
    bus: &Arc<dyn WindowBus>,
    window: &str,
    timeout: Option<Duration>,
) -> Result<InitPayload, SyncError> {
    let (tx, rx) = oneshot::channel::<BusEvent>();
    let tx = Mutex::new(Some(tx));
    let handler: Handler = Arc::new(move |event: &BusEvent| {
        if let Some(tx) = tx.lock().expect("handshake poisoned").take() {
            let _ = tx.send(event.clone());
        }
    });
    let _response = subscribe_once(bus, window, EVENT_INIT_RESPONSE, handler);

    bus.publish(BusEvent::new(
        EVENT_INIT_REQUEST,
        window,
        EventTarget::Window(window.to_string()),
        serde_json::Value::Null,
    ))?;

    let received = match timeout {
        Some(limit) => tokio::time::timeout(limit, rx)
            .await
            .map_err(|_| SyncError::Timeout(EVENT_INIT_RESPONSE))?,
        None => rx.await,
    };
    let event = received.map_err(|_| SyncError::Closed)?;
    event.decode()
}

/// Answers the first init request of `window` with `sticker`, exactly once.
pub fn serve_init(bus: &Arc<dyn WindowBus>, window: &str, sticker: &Sticker) -> Subscription {
    let responder = bus.clone();
    let label = window.to_string();
    let payload = InitPayload::from(sticker);
    let handler: Handler = Arc::new(move |_event: &BusEvent| {
        let value = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(err) => {
                log::error!("init payload encode failed window={label} err={err}");
                return;
            }
        };
        let response = BusEvent::new(
            EVENT_INIT_RESPONSE,
            HOST_SOURCE,
            EventTarget::Window(label.clone()),
            value,
        );
        if let Err(err) = responder.publish(response) {
            log::warn!("init response failed window={label} err={err}");
        }
    });
    subscribe_once(bus, window, EVENT_INIT_REQUEST, handler)
}
