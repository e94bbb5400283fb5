//! Broker configuration
//!
//! Loaded from TOML or JSON. Besides the default context and channel
//! timeout, a configuration may declare extra variants as overrides on a
//! built-in or another declared variant.

use crate::broker::{BrokerResult, VariantOverrides, VariantRegistry};
use crate::channel::ChannelOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Variant used when a page does not name one
    #[serde(default = "default_context")]
    pub context: String,
    /// Public URL of the content server
    #[serde(default = "default_content_server_url")]
    pub content_server_url: String,
    /// How long a channel request waits for the browser (in milliseconds)
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Additional variants
    #[serde(default)]
    pub variants: Vec<VariantOverrides>,
}

fn default_context() -> String { "web".to_string() }
fn default_content_server_url() -> String { "http://127.0.0.1:3030".to_string() }
fn default_response_timeout_ms() -> u64 { 5000 }

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            context: default_context(),
            content_server_url: default_content_server_url(),
            response_timeout_ms: default_response_timeout_ms(),
            variants: Vec::new(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: BrokerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: BrokerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            response_timeout: Duration::from_millis(self.response_timeout_ms),
        }
    }

    /// Built-in variants plus the ones declared here
    pub fn build_registry(&self) -> BrokerResult<VariantRegistry> {
        let mut registry = VariantRegistry::builtin();
        registry.register_all(&self.variants)?;
        registry.get(&self.context)?;
        Ok(registry)
    }

    /// Generate a sample configuration file content
    pub fn generate_sample_config() -> String {
        let mut sample = Self::default();
        sample.variants.push(
            VariantOverrides::new("fx-desktop-v1-no-signup", "fx-desktop-v1")
                .capability(crate::broker::capabilities::SIGNUP, false),
        );
        toml::to_string_pretty(&sample).unwrap_or_else(|_| {
            "# Failed to generate sample configuration".to_string()
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.response_timeout_ms == 0 {
            errors.push("Response timeout must be greater than 0".to_string());
        }

        if url::Url::parse(&self.content_server_url).is_err() {
            errors.push(format!("Invalid content server URL: {}", self.content_server_url));
        }

        let mut names = HashSet::new();
        for variant in &self.variants {
            if variant.type_name.is_empty() {
                errors.push("Variant type must not be empty".to_string());
            } else if !names.insert(variant.type_name.as_str()) {
                errors.push(format!("Variant '{}' is declared more than once", variant.type_name));
            }
        }

        if errors.is_empty() {
            if let Err(e) = self.build_registry() {
                errors.push(e.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
