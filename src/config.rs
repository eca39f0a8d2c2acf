use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Rosbridge topic names and message types used on the link.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Topics {
    pub command: String,
    pub command_type: String,
    pub log: String,
    pub log_type: String,
    pub action: String,
    pub action_type: String,
    pub scene: String,
    pub scene_type: String,
    /// Signals that sidekick speech finished playing.
    pub audio: String,
    pub audio_type: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            command: "/opal_tablet_command".to_string(),
            command_type: "/sar_opal_msgs/OpalCommand".to_string(),
            log: "/opal_tablet".to_string(),
            log_type: "std_msgs/String".to_string(),
            action: "/opal_tablet_action".to_string(),
            action_type: "/sar_opal_msgs/OpalAction".to_string(),
            scene: "/opal_tablet_scene".to_string(),
            scene_type: "/sar_opal_msgs/OpalScene".to_string(),
            audio: "/opal_tablet_audio".to_string(),
            audio_type: "/std_msgs/Bool".to_string(),
        }
    }
}

#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub server: String,
    pub port: Option<u16>,
    pub sidekick: bool,
    pub assets_dir: String,
    pub window_title: String,
    pub window_width: f32,
    pub window_height: f32,
    pub background_color: [f32; 3],
    /// Seconds to wait before reconnecting after the link drops. `None` leaves it down.
    pub reconnect_delay_secs: Option<u64>,
    pub topics: Topics,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1".to_string(),
            port: Some(9090),
            sidekick: true,
            assets_dir: "assets".to_string(),
            window_title: "Stagehand".to_string(),
            window_width: 1280.0,
            window_height: 800.0,
            background_color: [0.0, 0.0, 0.0],
            reconnect_delay_secs: None,
            topics: Topics::default(),
        }
    }
}

impl StageConfig {
    pub fn websocket_url(&self) -> String {
        match self.port {
            Some(port) => format!("ws://{}:{}", self.server, port),
            None => format!("ws://{}", self.server),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(server) = env_value("STAGEHAND_SERVER") {
            self.server = server;
        }
        if let Some(port) = env_value("STAGEHAND_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = Some(port),
                Err(_) => eprintln!("[Stage config] Ignoring invalid STAGEHAND_PORT '{port}'"),
            }
        }
        if let Some(dir) = env_value("STAGEHAND_ASSETS_DIR") {
            self.assets_dir = dir;
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_stage_config(contents: &str) -> Result<StageConfig, serde_json::Error> {
    serde_json::from_str::<StageConfig>(contents)
}

/// Reads `stage.json` (or `$STAGEHAND_CONFIG`), then applies env overrides.
/// Runs before logging is set up, so it prints directly.
pub fn load_stage_config() -> StageConfig {
    let path = env_value("STAGEHAND_CONFIG").unwrap_or_else(|| "stage.json".to_string());
    let mut config = match std::fs::read_to_string(&path) {
        Ok(contents) => match parse_stage_config(&contents) {
            Ok(cfg) => {
                println!("[Stage config] Loaded config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Stage config] Failed to parse {}: {}", path, e);
                StageConfig::default()
            }
        },
        Err(_) => StageConfig::default(),
    };
    config.apply_env_overrides();
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = parse_stage_config(r#"{"server": "10.0.0.4", "topics": {"command": "/cmd"}}"#)
            .expect("parse config");
        assert_eq!(cfg.server, "10.0.0.4");
        assert_eq!(cfg.port, Some(9090));
        assert!(cfg.sidekick);
        assert_eq!(cfg.topics.command, "/cmd");
        assert_eq!(cfg.topics.log, "/opal_tablet");
        assert_eq!(cfg.reconnect_delay_secs, None);
    }

    #[test]
    fn websocket_url_omits_missing_port() {
        let mut cfg = StageConfig::default();
        assert_eq!(cfg.websocket_url(), "ws://127.0.0.1:9090");
        cfg.port = None;
        cfg.server = "robot.local".to_string();
        assert_eq!(cfg.websocket_url(), "ws://robot.local");
    }
}
