//! Roomcast CLI configuration management
//!
//! Layered configuration loading with figment, priority ordering:
//! CLI args > `ROOMCAST_*` env vars > config file > defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the Roomcast CLI application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relay endpoint configuration
    pub relay: RelayEndpointConfig,

    /// Identity configuration for the local session store
    pub identity: IdentityConfig,

    /// Chat behavior configuration
    pub chat: ChatConfig,
}

/// Where to find the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEndpointConfig {
    /// Relay WebSocket URL
    pub url: String,
}

/// Identity used to build the local user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Email-like handle; derived from the display name when unset
    pub email: Option<String>,

    /// Avatar image URL
    pub avatar_url: Option<String>,
}

/// Chat behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Room joined by default
    pub room: String,

    /// Seconds to wait for the channel to subscribe before giving up
    pub subscribe_timeout_secs: u64,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            relay: RelayEndpointConfig {
                url: "ws://127.0.0.1:7350".to_string(),
            },
            identity: IdentityConfig {
                email: None,
                avatar_url: None,
            },
            chat: ChatConfig {
                room: "room_one".to_string(),
                subscribe_timeout_secs: 15,
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration with the full layering. An explicit path must
    /// exist; the default path is merged only when present.
    pub fn load(explicit_path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match explicit_path {
            Some(path) => {
                figment = figment.merge(Toml::file_exact(path));
            }
            None => {
                if let Some(default_path) = Self::default_config_path() {
                    figment = figment.merge(Toml::file(default_path));
                }
            }
        }

        let config = figment
            .merge(Env::prefixed("ROOMCAST_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Default config file location, e.g. `~/.config/roomcast/roomcast.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("roomcast").join("roomcast.toml"))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.chat.room, "room_one");
        assert!(config.relay.url.starts_with("ws://"));
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "roomcast.toml",
                r#"
                    [relay]
                    url = "ws://relay.example.com:9000"

                    [chat]
                    room = "lobby"
                "#,
            )?;
            let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Toml::file("roomcast.toml"))
                .extract()?;
            assert_eq!(config.relay.url, "ws://relay.example.com:9000");
            assert_eq!(config.chat.room, "lobby");
            // Untouched sections keep their defaults
            assert_eq!(config.chat.subscribe_timeout_secs, 15);
            Ok(())
        });
    }

    #[test]
    fn test_env_layer_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "roomcast.toml",
                r#"
                    [chat]
                    room = "lobby"
                "#,
            )?;
            jail.set_env("ROOMCAST_CHAT__ROOM", "ops");
            let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Toml::file("roomcast.toml"))
                .merge(Env::prefixed("ROOMCAST_").split("__"))
                .extract()?;
            assert_eq!(config.chat.room, "ops");
            Ok(())
        });
    }
}
