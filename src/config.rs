// Logging switches are compile-time; everything else is loaded at runtime.

use crate::capture::CaptureConstraints;
use crate::error::{Error, Result};
use crate::hark::HarkOptions;
use crate::peer::types::ServerConfig;
use serde::{Deserialize, Serialize};

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true;

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false;

#[cfg(debug_assertions)]
pub mod dev {
    // Set to false to silence a debug build completely.
    pub const ENABLE_LOGGING: bool = true;
}

#[cfg(not(debug_assertions))]
pub mod dev {
    pub const ENABLE_LOGGING: bool = false;
}

/// Speaker detection threshold in dB, shared by every stream of a room
pub const DEFAULT_THRESHOLD_SPEAKER: f64 = -50.0;

/// Runtime configuration shared by the streams of one room
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub ice_servers: Vec<ServerConfig>,
    pub capture: CaptureConstraints,
    pub threshold_speaker: f64,
    pub hark: HarkOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            capture: CaptureConstraints::default(),
            threshold_speaker: DEFAULT_THRESHOLD_SPEAKER,
            hark: HarkOptions::default(),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for server in &self.ice_servers {
            if server.url.is_empty() {
                return Err(Error::Config(format!(
                    "ICE server '{}' has an empty URL",
                    server.id
                )));
            }
            if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none())
            {
                return Err(Error::Config(format!(
                    "TURN server '{}' requires username and credential",
                    server.id
                )));
            }
        }
        if !self.capture.audio && !self.capture.video.enabled {
            return Err(Error::Config(
                "capture constraints request neither audio nor video".into(),
            ));
        }
        Ok(())
    }
}

pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig {
            id: "default-stun".into(),
            r#type: "stun".into(),
            url: "stun:stun.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
        ServerConfig {
            id: "default-stun-1".into(),
            r#type: "stun".into(),
            url: "stun:stun1.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
    ]
}
