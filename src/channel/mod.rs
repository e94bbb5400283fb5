//! Browser Channel Module
//!
//! Abstracts the transport used to notify the embedding browser. Two
//! transports exist: the legacy Firefox Desktop v1 channel, which posts
//! `{command, data}` messages and correlates replies by command name, and
//! the WebChannel, which wraps messages in a channel-id envelope and
//! correlates replies by `messageId`.

pub mod error;
pub mod fx_desktop;
pub mod memory;
pub mod origin;
pub mod web_channel;

pub use error::{ChannelError, ChannelResult};
pub use fx_desktop::FxDesktopChannel;
pub use memory::{MemoryWindow, SentMessage, SentVia};
pub use origin::{NULL_ORIGIN, TrustedOrigin};
pub use web_channel::WebChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

/// Default web channel id used by Firefox account integrations
pub const DEFAULT_WEB_CHANNEL_ID: &str = "account_updates";

/// Location of the page hosting the content server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    /// `location.origin`, absent on older shells
    pub origin: Option<String>,
    /// Full page URL
    pub href: String,
}

impl PageLocation {
    pub fn new(origin: Option<String>, href: impl Into<String>) -> Self {
        Self {
            origin,
            href: href.into(),
        }
    }
}

/// Handle to the window the content server runs in
pub trait BrowserWindow: Send + Sync {
    /// Current page location
    fn location(&self) -> PageLocation;

    /// Post a message to the embedding browser, restricted to `target_origin`
    fn post_message(&self, message: &Value, target_origin: &str) -> ChannelResult<()>;

    /// Dispatch a `WebChannelMessageToChrome` event carrying `envelope`
    fn dispatch_web_channel_message(&self, envelope: &Value) -> ChannelResult<()>;
}

/// A message received from the embedding browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Origin reported for the sender
    pub origin: String,
    /// Message body
    pub data: Value,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Which transport a broker variant talks through
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Plain web visits have no embedding browser to notify
    #[default]
    None,
    /// Legacy Firefox Desktop `about:accounts` messaging
    FxDesktopV1,
    /// WebChannel messaging on the given channel id
    WebChannel { id: String },
}

/// Tunables shared by all channel implementations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// How long a request waits for its reply
    pub response_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
        }
    }
}

/// Callback invoked for every channel error
pub type ErrorHandler = Arc<dyn Fn(&ChannelError) + Send + Sync>;

/// Subscribers to `error` events
#[derive(Clone, Default)]
pub struct ErrorObservers {
    handlers: Arc<Mutex<Vec<ErrorHandler>>>,
}

impl ErrorObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    pub fn subscribe(&self, handler: ErrorHandler) {
        lock(&self.handlers).push(handler);
    }

    /// Deliver `error` to every handler, in subscription order
    pub fn emit(&self, error: &ChannelError) {
        let handlers = lock(&self.handlers).clone();
        for handler in handlers {
            handler(error);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.handlers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ErrorObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorObservers")
            .field("handlers", &self.len())
            .finish()
    }
}

/// Messaging session with the embedding browser
#[async_trait]
pub trait Channel: Send + Sync {
    /// Transport this channel uses
    fn kind(&self) -> ChannelKind;

    /// Origin this session accepts messages from
    fn trusted_origin(&self) -> &TrustedOrigin;

    /// Fire-and-forget message. Delivery failures go to the error observers.
    async fn send(&self, command: &str, data: Value);

    /// Send a message and wait for the browser's reply. Failures are
    /// returned to the caller, not emitted.
    async fn request(&self, command: &str, data: Value) -> ChannelResult<Value>;

    /// Feed an inbound message. Returns false when the message was rejected.
    fn receive(&self, message: InboundMessage) -> bool;

    /// Subscribe to `error` events
    fn on_error(&self, handler: ErrorHandler);
}

/// Create the channel for `kind`, bound to the window's trusted origin
pub fn create_channel(
    kind: &ChannelKind,
    window: Arc<dyn BrowserWindow>,
    options: ChannelOptions,
) -> ChannelResult<Option<Arc<dyn Channel>>> {
    let channel: Arc<dyn Channel> = match kind {
        ChannelKind::None => return Ok(None),
        ChannelKind::FxDesktopV1 => {
            let location = window.location();
            let origin = TrustedOrigin::resolve(location.origin.as_deref(), &location.href)?;
            Arc::new(FxDesktopChannel::initialize(origin, window, options))
        }
        ChannelKind::WebChannel { id } => {
            let location = window.location();
            let origin = TrustedOrigin::resolve(location.origin.as_deref(), &location.href)?;
            Arc::new(WebChannel::initialize(id.clone(), origin, window, options))
        }
    };
    log::debug!(
        "Created {:?} channel for origin {}",
        channel.kind(),
        channel.trusted_origin()
    );
    Ok(Some(channel))
}

/// Outstanding requests keyed by their correlation key
#[derive(Default)]
pub(crate) struct PendingRequests {
    waiting: Mutex<HashMap<String, oneshot::Sender<ChannelResult<Value>>>>,
}

impl PendingRequests {
    /// Register a request; one outstanding request per key
    pub(crate) fn register(
        &self,
        key: &str,
        command: &str,
    ) -> ChannelResult<oneshot::Receiver<ChannelResult<Value>>> {
        let mut waiting = lock(&self.waiting);
        if waiting.contains_key(key) {
            return Err(ChannelError::RequestPending(command.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        waiting.insert(key.to_string(), tx);
        Ok(rx)
    }

    /// Complete a request. Returns false when nothing was waiting on `key`.
    pub(crate) fn resolve(&self, key: &str, result: ChannelResult<Value>) -> bool {
        match lock(&self.waiting).remove(key) {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub(crate) fn forget(&self, key: &str) {
        lock(&self.waiting).remove(key);
    }

    /// Wait for the reply registered under `key`
    pub(crate) async fn wait(
        &self,
        key: &str,
        command: &str,
        rx: oneshot::Receiver<ChannelResult<Value>>,
        timeout: Duration,
    ) -> ChannelResult<Value> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ChannelError::Canceled(command.to_string())),
            Err(_) => {
                self.forget(key);
                Err(ChannelError::Timeout {
                    command: command.to_string(),
                    duration_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Remote error carried by an inbound message, if any
pub(crate) fn remote_error(message: &Value) -> Option<String> {
    match message.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(o)) => Some(
            o.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(o.clone()).to_string()),
        ),
        Some(other) => Some(other.to_string()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
