//! Auth Broker Module
//!
//! A broker decides, for one integration context, what the embedding
//! browser is told after each authentication step and which behavior the
//! view runs next. The per-context differences live entirely in
//! [`BrokerVariant`] data; [`Broker`] is the single runtime that executes a
//! variant's side effects and hands back its behaviors.

pub mod behavior;
pub mod capabilities;
pub mod error;
pub mod types;
pub mod variants;


pub use behavior::{Behavior, BehaviorRegistry, Transition};
pub use capabilities::CapabilitySet;
pub use error::{BrokerError, BrokerResult};
pub use types::{Account, Command, Hook, LoginPayload, OAuthAction};
pub use variants::{BrokerVariant, SideEffect, VariantOverrides, VariantRegistry};

use crate::channel::{
    self, BrowserWindow, Channel, ChannelError, ChannelOptions, ErrorHandler, ErrorObservers,
    InboundMessage,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Broker bound to one page load
pub struct Broker {
    variant: Arc<BrokerVariant>,
    window: Arc<dyn BrowserWindow>,
    options: ChannelOptions,
    channel: OnceCell<Option<Arc<dyn Channel>>>,
    observers: ErrorObservers,
}

impl Broker {
    /// Create a broker for `variant` hosted in `window`
    pub fn new(variant: Arc<BrokerVariant>, window: Arc<dyn BrowserWindow>) -> Self {
        Self::with_options(variant, window, ChannelOptions::default())
    }

    pub fn with_options(
        variant: Arc<BrokerVariant>,
        window: Arc<dyn BrowserWindow>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            variant,
            window,
            options,
            channel: OnceCell::new(),
            observers: ErrorObservers::new(),
        }
    }

    /// Look up `type_name` in `registry` and create a broker for it
    pub fn from_registry(
        registry: &VariantRegistry,
        type_name: &str,
        window: Arc<dyn BrowserWindow>,
        options: ChannelOptions,
    ) -> BrokerResult<Self> {
        Ok(Self::with_options(registry.get(type_name)?, window, options))
    }

    pub fn type_name(&self) -> &str {
        self.variant.type_name()
    }

    pub fn variant(&self) -> &BrokerVariant {
        &self.variant
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.variant.has_capability(name)
    }

    /// Behavior configured for `hook`, without running side effects
    pub fn get_behavior(&self, hook: Hook) -> Arc<Behavior> {
        self.variant.behavior(hook)
    }

    /// Subscribe to channel errors. They are passed through unchanged.
    pub fn on_error(&self, handler: ErrorHandler) {
        self.observers.subscribe(handler);
    }

    /// The broker's channel, created on first use
    pub async fn channel(&self) -> BrokerResult<Option<Arc<dyn Channel>>> {
        let channel = self
            .channel
            .get_or_try_init(|| async {
                let created = channel::create_channel(
                    self.variant.channel(),
                    self.window.clone(),
                    self.options.clone(),
                )?;
                if let Some(channel) = &created {
                    let observers = self.observers.clone();
                    channel.on_error(Arc::new(move |e: &ChannelError| observers.emit(e)));
                }
                Ok::<_, BrokerError>(created)
            })
            .await?;
        Ok(channel.clone())
    }

    /// Hand a message from the embedding browser to the channel
    pub async fn receive(&self, message: InboundMessage) -> BrokerResult<bool> {
        Ok(match self.channel().await? {
            Some(channel) => channel.receive(message),
            None => false,
        })
    }

    /// Run the side effects of `hook`, then return its behavior
    pub async fn dispatch(&self, hook: Hook, account: &Account) -> BrokerResult<Arc<Behavior>> {
        for effect in self.variant.side_effects(hook) {
            self.run_side_effect(hook, *effect, account).await?;
        }
        let behavior = self.variant.behavior(hook);
        log::info!(
            "{} {} -> {}",
            self.variant.type_name(),
            hook,
            behavior.kind()
        );
        Ok(behavior)
    }

    pub async fn after_loaded(&self) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterLoaded, &Account::default()).await
    }

    pub async fn before_sign_in(&self, account: &Account) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::BeforeSignIn, account).await
    }

    pub async fn after_sign_in(&self, account: &Account) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterSignIn, account).await
    }

    pub async fn after_sign_up(&self, account: &Account) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterSignUp, account).await
    }

    pub async fn after_force_auth(&self, account: &Account) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterForceAuth, account).await
    }

    pub async fn before_sign_up_confirmation_poll(
        &self,
        account: &Account,
    ) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::BeforeSignUpConfirmationPoll, account).await
    }

    pub async fn after_sign_in_confirmation_poll(
        &self,
        account: &Account,
    ) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterSignInConfirmationPoll, account).await
    }

    pub async fn after_sign_up_confirmation_poll(
        &self,
        account: &Account,
    ) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterSignUpConfirmationPoll, account).await
    }

    pub async fn after_reset_password_confirmation_poll(
        &self,
        account: &Account,
    ) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterResetPasswordConfirmationPoll, account).await
    }

    pub async fn after_complete_sign_in(&self, account: &Account) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterCompleteSignIn, account).await
    }

    pub async fn after_complete_sign_up(&self, account: &Account) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterCompleteSignUp, account).await
    }

    pub async fn after_complete_reset_password(
        &self,
        account: &Account,
    ) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterCompleteResetPassword, account).await
    }

    pub async fn after_change_password(&self, account: &Account) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterChangePassword, account).await
    }

    pub async fn after_delete_account(&self, account: &Account) -> BrokerResult<Arc<Behavior>> {
        self.dispatch(Hook::AfterDeleteAccount, account).await
    }

    async fn run_side_effect(
        &self,
        hook: Hook,
        effect: SideEffect,
        account: &Account,
    ) -> BrokerResult<()> {
        let command = effect.command();
        let wire = self
            .variant
            .wire_command(command)
            .ok_or_else(|| BrokerError::unsupported_command(self.type_name(), command.as_str()))?
            .to_string();
        let channel = self
            .channel()
            .await?
            .ok_or_else(|| BrokerError::NoChannel(self.type_name().to_string()))?;

        match effect {
            SideEffect::NotifyLoaded => channel.send(&wire, json!({})).await,
            SideEffect::CheckCanLinkAccount => {
                // A failed check does not block sign-in; the browser warns
                // about relinking on its own.
                match channel
                    .request(&wire, json!({ "email": account.email }))
                    .await
                {
                    Ok(reply) if declines_link(&reply) => {
                        log::info!("Browser declined to link {}", account.email);
                        return Err(BrokerError::UserCanceledLogin);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("{} failed for {}: {}", wire, account.email, e);
                        self.observers.emit(&e);
                    }
                }
            }
            SideEffect::NotifyLogin | SideEffect::NotifyPasswordChange => {
                let account = account.with_sync_defaults();
                let payload = LoginPayload::from_account(&account)?;
                let data = serde_json::to_value(&payload).map_err(ChannelError::from)?;
                channel.send(&wire, data).await;
            }
            SideEffect::NotifyAccountDeleted => {
                channel
                    .send(&wire, json!({ "email": account.email, "uid": account.uid }))
                    .await
            }
            SideEffect::NotifyOAuthLogin => {
                let data = json!({
                    "email": account.email,
                    "uid": account.uid,
                    "action": OAuthAction::for_hook(hook),
                });
                channel.send(&wire, data).await;
            }
        }
        Ok(())
    }
}

/// Only an explicit answer without `ok: true` refuses the link. An empty
/// reply lets sign-in continue.
fn declines_link(reply: &Value) -> bool {
    match reply {
        Value::Object(fields) => fields.get("ok").and_then(Value::as_bool) != Some(true),
        _ => false,
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("type", &self.variant.type_name())
            .field("channel", &self.variant.channel())
            .field("observers", &self.observers)
            .finish()
    }
}
