//! Relayer configuration.

use serde::{Deserialize, Serialize};

use crate::transport::PublishOptions;

/// Top-level relayer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// TTL attached to every publish, in seconds.
    #[serde(default = "default_publish_ttl")]
    pub publish_ttl_secs: u64,
    /// Whether requests ask the receiving wallet to prompt the user.
    #[serde(default)]
    pub prompt: bool,
    /// Relay tag attached to outbound requests.
    #[serde(default)]
    pub request_tag: u32,
    /// Relay tag attached to outbound responses.
    #[serde(default)]
    pub response_tag: u32,
}

fn default_publish_ttl() -> u64 { 6 * 60 * 60 }

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            publish_ttl_secs: default_publish_ttl(),
            prompt: false,
            request_tag: 0,
            response_tag: 0,
        }
    }
}

impl RelayerConfig {
    /// Publish options for outbound requests.
    pub fn request_options(&self) -> PublishOptions {
        PublishOptions {
            ttl_secs: self.publish_ttl_secs,
            prompt: self.prompt,
            tag: self.request_tag,
        }
    }

    /// Publish options for outbound responses. Responses never prompt.
    pub fn response_options(&self) -> PublishOptions {
        PublishOptions {
            ttl_secs: self.publish_ttl_secs,
            prompt: false,
            tag: self.response_tag,
        }
    }
}
