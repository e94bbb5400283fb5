//! In-process browser window
//!
//! Records every outbound message instead of handing it to a browser. Used
//! by the CLI to show what an integration would send, and by tests.

use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::{BrowserWindow, PageLocation};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// How a recorded message left the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum SentVia {
    PostMessage { target_origin: String },
    WebChannel,
}

/// A recorded outbound message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentMessage {
    #[serde(flatten)]
    pub via: SentVia,
    pub payload: Value,
}

impl SentMessage {
    /// Wire command carried by the message, for either transport
    pub fn command(&self) -> Option<&str> {
        self.payload
            .get("command")
            .or_else(|| self.payload.get("message").and_then(|m| m.get("command")))
            .and_then(Value::as_str)
    }

    /// `data` carried by the message, for either transport
    pub fn data(&self) -> Option<&Value> {
        self.payload
            .get("message")
            .and_then(|m| m.get("data"))
            .or_else(|| self.payload.get("data"))
    }

    /// WebChannel `messageId`, if any
    pub fn message_id(&self) -> Option<&str> {
        self.payload
            .get("message")
            .and_then(|m| m.get("messageId"))
            .and_then(Value::as_str)
    }
}

/// Window that keeps outbound messages in memory
pub struct MemoryWindow {
    location: PageLocation,
    sent: Mutex<Vec<SentMessage>>,
    closed: AtomicBool,
    posted: Notify,
}

impl MemoryWindow {
    /// Window at `href`, with `location.origin` derived from it
    pub fn new(href: &str) -> Self {
        let origin = url::Url::parse(href)
            .ok()
            .map(|u| u.origin().ascii_serialization());
        Self::with_location(PageLocation::new(origin, href))
    }

    pub fn with_location(location: PageLocation) -> Self {
        Self {
            location,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            posted: Notify::new(),
        }
    }

    /// Make every later delivery fail with `WindowClosed`
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Messages delivered so far
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Wire commands delivered so far, in order
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent_messages()
            .iter()
            .filter_map(|m| m.command().map(str::to_string))
            .collect()
    }

    /// Wait until at least `count` messages were delivered
    pub async fn wait_for_sent(&self, count: usize) -> Vec<SentMessage> {
        loop {
            let notified = self.posted.notified();
            let sent = self.sent_messages();
            if sent.len() >= count {
                return sent;
            }
            notified.await;
        }
    }

    fn record(&self, via: SentVia, payload: &Value) -> ChannelResult<()> {
        if self.is_closed() {
            return Err(ChannelError::WindowClosed);
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(SentMessage {
                via,
                payload: payload.clone(),
            });
        self.posted.notify_waiters();
        Ok(())
    }
}

impl BrowserWindow for MemoryWindow {
    fn location(&self) -> PageLocation {
        self.location.clone()
    }

    fn post_message(&self, message: &Value, target_origin: &str) -> ChannelResult<()> {
        self.record(
            SentVia::PostMessage {
                target_origin: target_origin.to_string(),
            },
            message,
        )
    }

    fn dispatch_web_channel_message(&self, envelope: &Value) -> ChannelResult<()> {
        self.record(SentVia::WebChannel, envelope)
    }
}
