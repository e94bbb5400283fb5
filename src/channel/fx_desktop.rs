//! Firefox Desktop v1 channel
//!
//! `about:accounts` in Firefox Desktop hosts the content server in an
//! iframe. Messages go out as `{command, data}` and the browser answers with
//! a message carrying the same `command`, so at most one request per command
//! can be outstanding. The browser posts with an origin of `"null"`.

use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::{
    BrowserWindow, Channel, ChannelKind, ChannelOptions, ErrorHandler, ErrorObservers,
    InboundMessage, PendingRequests, TrustedOrigin, remote_error,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

/// Legacy Desktop channel
pub struct FxDesktopChannel {
    origin: TrustedOrigin,
    window: Arc<dyn BrowserWindow>,
    options: ChannelOptions,
    pending: PendingRequests,
    observers: ErrorObservers,
}

impl FxDesktopChannel {
    /// Bind a session to `origin` on `window`
    pub fn initialize(
        origin: TrustedOrigin,
        window: Arc<dyn BrowserWindow>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            origin,
            window,
            options,
            pending: PendingRequests::default(),
            observers: ErrorObservers::new(),
        }
    }

    fn post(&self, command: &str, data: Value) -> ChannelResult<()> {
        let message = json!({ "command": command, "data": data });
        self.window
            .post_message(&message, self.origin.as_str())
            .map_err(|e| match e {
                ChannelError::WindowClosed => e,
                other => ChannelError::delivery(command, other.to_string()),
            })
    }
}

#[async_trait]
impl Channel for FxDesktopChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::FxDesktopV1
    }

    fn trusted_origin(&self) -> &TrustedOrigin {
        &self.origin
    }

    async fn send(&self, command: &str, data: Value) {
        log::debug!("fx-desktop-v1 send {}", command);
        if let Err(e) = self.post(command, data) {
            log::warn!("fx-desktop-v1 failed to send {}: {}", command, e);
            self.observers.emit(&e);
        }
    }

    async fn request(&self, command: &str, data: Value) -> ChannelResult<Value> {
        let rx = self.pending.register(command, command)?;
        if let Err(e) = self.post(command, data) {
            self.pending.forget(command);
            return Err(e);
        }
        self.pending
            .wait(command, command, rx, self.options.response_timeout)
            .await
    }

    fn receive(&self, message: InboundMessage) -> bool {
        if !self.origin.accepts(&message.origin) {
            log::warn!("fx-desktop-v1 dropped message from untrusted origin {}", message.origin);
            return false;
        }
        let Some(command) = message.data.get("command").and_then(Value::as_str) else {
            log::debug!("fx-desktop-v1 ignored message without a command");
            return false;
        };
        let result = match remote_error(&message.data) {
            Some(reason) => Err(ChannelError::remote(command, reason)),
            None => Ok(message.data.get("data").cloned().unwrap_or(Value::Null)),
        };
        if !self.pending.resolve(command, result) {
            log::debug!("fx-desktop-v1 received unsolicited {}", command);
        }
        true
    }

    fn on_error(&self, handler: ErrorHandler) {
        self.observers.subscribe(handler);
    }
}
