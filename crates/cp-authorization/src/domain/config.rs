//! Charge point configuration with validation.

use crate::domain::error::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default central system endpoint (charge point id is appended as a path segment)
pub const DEFAULT_CENTRAL_SYSTEM_URL: &str = "ws://localhost:8180/steve/websocket/CentralSystemService";

/// Default WebSocket subprotocol
pub const DEFAULT_SUBPROTOCOL: &str = "ocpp1.6";

/// Main charge point configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargePointConfig {
    /// Central system connection (used by the connection owner, not the core)
    pub connection: ConnectionConfig,
    /// State machine configuration
    pub machine: MachineConfig,
    /// Inbound frame limits
    pub limits: LimitsConfig,
}

impl ChargePointConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machine.event_queue_capacity == 0 {
            return Err(ConfigError::InvalidCapacity(
                "event_queue_capacity cannot be 0".into(),
            ));
        }

        if self.limits.max_frame_size == 0 {
            return Err(ConfigError::InvalidLimit("max_frame_size cannot be 0".into()));
        }

        if self.connection.charge_point_id.trim().is_empty() {
            return Err(ConfigError::InvalidConnection(
                "charge_point_id cannot be empty".into(),
            ));
        }

        if self.connection.subprotocol.trim().is_empty() {
            return Err(ConfigError::InvalidConnection(
                "subprotocol cannot be empty".into(),
            ));
        }

        Ok(())
    }

    /// Defaults overridden by `CP_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("CP_CENTRAL_SYSTEM_URL") {
            config.connection.central_system_url = url;
        }
        if let Some(id) = lookup("CP_CHARGE_POINT_ID") {
            config.connection.charge_point_id = id;
        }
        if let Some(protocol) = lookup("CP_SUBPROTOCOL") {
            config.connection.subprotocol = protocol;
        }
        if let Some(capacity) = lookup("CP_EVENT_QUEUE_CAPACITY") {
            match capacity.parse() {
                Ok(c) => config.machine.event_queue_capacity = c,
                Err(_) => warn!(value = %capacity, "Ignoring invalid CP_EVENT_QUEUE_CAPACITY"),
            }
        }
        if let Some(size) = lookup("CP_MAX_FRAME_SIZE") {
            match size.parse() {
                Ok(s) => config.limits.max_frame_size = s,
                Err(_) => warn!(value = %size, "Ignoring invalid CP_MAX_FRAME_SIZE"),
            }
        }

        config
    }
}

/// Central system connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Base WebSocket URL of the central system
    pub central_system_url: String,
    /// Identity of this charge point
    pub charge_point_id: String,
    /// WebSocket subprotocol to request
    pub subprotocol: String,
}

impl ConnectionConfig {
    /// Full endpoint: base URL with the charge point id appended.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.central_system_url.trim_end_matches('/'),
            self.charge_point_id
        )
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            central_system_url: DEFAULT_CENTRAL_SYSTEM_URL.to_string(),
            charge_point_id: "john".to_string(),
            subprotocol: DEFAULT_SUBPROTOCOL.to_string(),
        }
    }
}

/// State machine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Capacity of the single ordered event queue
    pub event_queue_capacity: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 64,
        }
    }
}

/// Inbound frame limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Frames larger than this are dropped before parsing (bytes)
    pub max_frame_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 64 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ChargePointConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = ChargePointConfig::default();
        config.machine.event_queue_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCapacity(_))
        ));

        let mut config = ChargePointConfig::default();
        config.limits.max_frame_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn test_validation_rejects_empty_identity() {
        let mut config = ChargePointConfig::default();
        config.connection.charge_point_id = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConnection(_))
        ));

        let mut config = ChargePointConfig::default();
        config.connection.subprotocol = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint() {
        let mut connection = ConnectionConfig::default();
        assert_eq!(
            connection.endpoint(),
            "ws://localhost:8180/steve/websocket/CentralSystemService/john"
        );

        connection.central_system_url = "ws://cs.example/ocpp/".into();
        connection.charge_point_id = "CP-7".into();
        assert_eq!(connection.endpoint(), "ws://cs.example/ocpp/CP-7");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CP_CHARGE_POINT_ID", "CP-42"),
            ("CP_EVENT_QUEUE_CAPACITY", "8"),
            ("CP_MAX_FRAME_SIZE", "not-a-number"),
        ]);
        let config = ChargePointConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.connection.charge_point_id, "CP-42");
        assert_eq!(config.machine.event_queue_capacity, 8);
        // Invalid values keep the default
        assert_eq!(config.limits.max_frame_size, LimitsConfig::default().max_frame_size);
        assert_eq!(config.connection.subprotocol, DEFAULT_SUBPROTOCOL);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: ChargePointConfig =
            serde_json::from_str(r#"{"machine": {"event_queue_capacity": 4}}"#).unwrap();
        assert_eq!(config.machine.event_queue_capacity, 4);
        assert_eq!(config.connection.charge_point_id, "john");
    }
}
