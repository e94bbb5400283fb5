//! WebChannel transport
//!
//! Messages travel inside an envelope naming the channel id:
//! `{id, message: {command, data, messageId}}`. Replies echo the
//! `messageId`, so several requests may be in flight at once.

use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::{
    BrowserWindow, Channel, ChannelKind, ChannelOptions, ErrorHandler, ErrorObservers,
    InboundMessage, PendingRequests, TrustedOrigin, remote_error,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// WebChannel session
pub struct WebChannel {
    id: String,
    origin: TrustedOrigin,
    window: Arc<dyn BrowserWindow>,
    options: ChannelOptions,
    pending: PendingRequests,
    observers: ErrorObservers,
}

impl WebChannel {
    /// Bind a session on channel `id` to `origin` on `window`
    pub fn initialize(
        id: String,
        origin: TrustedOrigin,
        window: Arc<dyn BrowserWindow>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            id,
            origin,
            window,
            options,
            pending: PendingRequests::default(),
            observers: ErrorObservers::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn envelope(&self, command: &str, data: Value, message_id: &str) -> Value {
        json!({
            "id": self.id,
            "message": {
                "command": command,
                "data": data,
                "messageId": message_id,
            }
        })
    }

    fn dispatch(&self, command: &str, data: Value, message_id: &str) -> ChannelResult<()> {
        let envelope = self.envelope(command, data, message_id);
        self.window
            .dispatch_web_channel_message(&envelope)
            .map_err(|e| match e {
                ChannelError::WindowClosed => e,
                other => ChannelError::delivery(command, other.to_string()),
            })
    }
}

#[async_trait]
impl Channel for WebChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::WebChannel {
            id: self.id.clone(),
        }
    }

    fn trusted_origin(&self) -> &TrustedOrigin {
        &self.origin
    }

    async fn send(&self, command: &str, data: Value) {
        let message_id = Uuid::new_v4().to_string();
        log::debug!("web channel {} send {} ({})", self.id, command, message_id);
        if let Err(e) = self.dispatch(command, data, &message_id) {
            log::warn!("web channel {} failed to send {}: {}", self.id, command, e);
            self.observers.emit(&e);
        }
    }

    async fn request(&self, command: &str, data: Value) -> ChannelResult<Value> {
        let message_id = Uuid::new_v4().to_string();
        let rx = self.pending.register(&message_id, command)?;
        if let Err(e) = self.dispatch(command, data, &message_id) {
            self.pending.forget(&message_id);
            return Err(e);
        }
        self.pending
            .wait(&message_id, command, rx, self.options.response_timeout)
            .await
    }

    fn receive(&self, message: InboundMessage) -> bool {
        if !self.origin.accepts(&message.origin) {
            log::warn!(
                "web channel {} dropped message from untrusted origin {}",
                self.id,
                message.origin
            );
            return false;
        }
        if message.data.get("id").and_then(Value::as_str) != Some(self.id.as_str()) {
            return false;
        }
        let Some(body) = message.data.get("message") else {
            log::debug!("web channel {} ignored envelope without a message", self.id);
            return false;
        };
        let command = body
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(message_id) = body.get("messageId").and_then(Value::as_str) else {
            log::debug!("web channel {} received browser event {}", self.id, command);
            return true;
        };
        let result = match remote_error(body) {
            Some(reason) => Err(ChannelError::remote(command, reason)),
            None => Ok(body.get("data").cloned().unwrap_or(Value::Null)),
        };
        if !self.pending.resolve(message_id, result) {
            log::debug!("web channel {} has no request waiting on {}", self.id, message_id);
        }
        true
    }

    fn on_error(&self, handler: ErrorHandler) {
        self.observers.subscribe(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MemoryWindow, SentVia};
    use std::time::Duration;

    fn web_channel(window: Arc<MemoryWindow>) -> Arc<WebChannel> {
        let origin = TrustedOrigin::from_href("https://accounts.firefox.com/").unwrap();
        Arc::new(WebChannel::initialize(
            "account_updates".to_string(),
            origin,
            window,
            ChannelOptions {
                response_timeout: Duration::from_millis(200),
            },
        ))
    }

    #[tokio::test]
    async fn test_send_wraps_message_in_envelope() {
        let window = Arc::new(MemoryWindow::new("https://accounts.firefox.com/"));
        let channel = web_channel(window.clone());

        channel.send("fxaccounts:loaded", json!({})).await;

        let sent = window.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].via, SentVia::WebChannel);
        assert_eq!(sent[0].payload["id"], "account_updates");
        assert_eq!(sent[0].command(), Some("fxaccounts:loaded"));
        assert!(sent[0].message_id().is_some());
    }

    #[tokio::test]
    async fn test_request_correlates_by_message_id() {
        let window = Arc::new(MemoryWindow::new("https://accounts.firefox.com/"));
        let channel = web_channel(window.clone());

        let requester = channel.clone();
        let handle = tokio::spawn(async move {
            requester
                .request("fxaccounts:can_link_account", json!({"email": "a@b.c"}))
                .await
        });

        let sent = window.wait_for_sent(1).await;
        let message_id = sent[0].message_id().unwrap().to_string();

        // A reply for some other message does not complete the request.
        assert!(channel.receive(InboundMessage::new(
            "https://accounts.firefox.com",
            json!({"id": "account_updates", "message": {"command": "fxaccounts:can_link_account", "messageId": "other", "data": {"ok": false}}})
        )));
        assert!(channel.receive(InboundMessage::new(
            "https://accounts.firefox.com",
            json!({"id": "account_updates", "message": {"command": "fxaccounts:can_link_account", "messageId": message_id, "data": {"ok": true}}})
        )));

        assert_eq!(handle.await.unwrap().unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_rejects_other_channel_and_untrusted_origin() {
        let window = Arc::new(MemoryWindow::new("https://accounts.firefox.com/"));
        let channel = web_channel(window);

        assert!(!channel.receive(InboundMessage::new(
            "https://accounts.firefox.com",
            json!({"id": "other_channel", "message": {"command": "fxaccounts:logout"}})
        )));
        assert!(!channel.receive(InboundMessage::new(
            "https://evil.example.com",
            json!({"id": "account_updates", "message": {"command": "fxaccounts:logout"}})
        )));
        assert!(channel.receive(InboundMessage::new(
            "null",
            json!({"id": "account_updates", "message": {"command": "fxaccounts:logout"}})
        )));
    }

    #[tokio::test]
    async fn test_request_failure_is_returned_not_emitted() {
        let window = Arc::new(MemoryWindow::new("https://accounts.firefox.com/"));
        let channel = web_channel(window.clone());
        let errors = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = errors.clone();
        channel.on_error(Arc::new(move |_: &ChannelError| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));

        window.close();
        let err = channel
            .request("fxaccounts:can_link_account", json!({}))
            .await
            .unwrap_err();

        assert_eq!(err, ChannelError::WindowClosed);
        assert_eq!(errors.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
