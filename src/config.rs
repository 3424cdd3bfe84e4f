// MIT License - Copyright (c) 2026 Peter Wright
// Bridge configuration and JSON persistence

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HEARTBEAT_SECS, DEFAULT_PANEL_PORT, DEFAULT_WS_PORT, FLUSH_QUIET_MS};
use crate::error::{Result, TLinkError};

/// Section name the bridge owns inside the persisted config file.
pub const CONFIG_SECTION: &str = "DSC.TLink";

/// Configuration for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address the panel link listens on.
    pub listen_address: String,
    /// Port panels dial out to (default: 3072).
    pub listen_port: u16,
    /// Address the WebSocket facade listens on.
    pub ws_address: String,
    /// WebSocket facade port.
    pub ws_port: u16,
    /// Our 12-digit integration identification number, announced in
    /// `RequestAccess`.
    pub integration_id: String,
    /// 8-digit access code for Type 1 key establishment.
    pub type1_access_code: Option<String>,
    /// 32-hex-digit access code for Type 2 key establishment.
    pub type2_access_code: Option<String>,
    /// Heartbeat interval in seconds; keep under the panel's two-minute
    /// idle timeout.
    pub heartbeat_interval_secs: u64,
    /// Inbound quiet window before outbound sends are released, in
    /// milliseconds.
    pub flush_quiet_ms: u64,
    /// Device class reported for zones on the UI facade.
    pub zone_device_class: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: DEFAULT_PANEL_PORT,
            ws_address: "0.0.0.0".to_string(),
            ws_port: DEFAULT_WS_PORT,
            integration_id: "000000000000".to_string(),
            type1_access_code: None,
            type2_access_code: None,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_SECS,
            flush_quiet_ms: FLUSH_QUIET_MS,
            zone_device_class: "door".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// The 8-digit integration identifier used for Type 1 key material:
    /// the trailing digits of the integration identification number.
    pub fn type1_identifier(&self) -> String {
        let id = &self.integration_id;
        if id.len() > 8 {
            id[id.len() - 8..].to_string()
        } else {
            format!("{id:0>8}")
        }
    }

    /// Basic sanity checks before accepting panel connections.
    pub fn validate(&self) -> Result<()> {
        if self.integration_id.len() != 12
            || !self.integration_id.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(TLinkError::InvalidKeyMaterial {
                details: "integration_id must be exactly 12 decimal digits".into(),
            });
        }
        if let Some(code) = &self.type1_access_code {
            if code.len() != 8 || !code.bytes().all(|b| b.is_ascii_digit()) {
                return Err(TLinkError::InvalidKeyMaterial {
                    details: "type1_access_code must be exactly 8 decimal digits".into(),
                });
            }
        }
        if let Some(code) = &self.type2_access_code {
            if code.len() != 32 || !code.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(TLinkError::InvalidKeyMaterial {
                    details: "type2_access_code must be exactly 32 hex digits".into(),
                });
            }
        }
        if self.type1_access_code.is_none() && self.type2_access_code.is_none() {
            return Err(TLinkError::InvalidKeyMaterial {
                details: "at least one of type1_access_code / type2_access_code is required".into(),
            });
        }
        Ok(())
    }

    /// Load the `DSC.TLink` section from a persisted JSON file. The file
    /// holds one top-level object keyed by section name; other sections
    /// are left untouched. A missing file or section yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let root: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| TLinkError::Encoding {
                details: format!("config file is not valid JSON: {e}"),
            })?;
        match root.get(CONFIG_SECTION) {
            Some(section) => {
                serde_json::from_value(section.clone()).map_err(|e| TLinkError::Encoding {
                    details: format!("invalid {CONFIG_SECTION} section: {e}"),
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Write this config back into its section, preserving any other
    /// sections in the file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut root: serde_json::Value = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({})),
            Err(_) => serde_json::json!({}),
        };
        if !root.is_object() {
            root = serde_json::json!({});
        }
        root[CONFIG_SECTION] =
            serde_json::to_value(self).map_err(|e| TLinkError::Encoding {
                details: format!("failed to serialise config: {e}"),
            })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&root).unwrap_or_default())?;
        Ok(())
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn listen_address(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_address = addr.into();
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.listen_port = port;
        self
    }

    pub fn ws_address(mut self, addr: impl Into<String>) -> Self {
        self.config.ws_address = addr.into();
        self
    }

    pub fn ws_port(mut self, port: u16) -> Self {
        self.config.ws_port = port;
        self
    }

    pub fn integration_id(mut self, id: impl Into<String>) -> Self {
        self.config.integration_id = id.into();
        self
    }

    pub fn type1_access_code(mut self, code: impl Into<String>) -> Self {
        self.config.type1_access_code = Some(code.into());
        self
    }

    pub fn type2_access_code(mut self, code: impl Into<String>) -> Self {
        self.config.type2_access_code = Some(code.into());
        self
    }

    pub fn heartbeat_interval_secs(mut self, secs: u64) -> Self {
        self.config.heartbeat_interval_secs = secs;
        self
    }

    pub fn flush_quiet_ms(mut self, ms: u64) -> Self {
        self.config.flush_quiet_ms = ms;
        self
    }

    pub fn zone_device_class(mut self, class: impl Into<String>) -> Self {
        self.config.zone_device_class = class.into();
        self
    }

    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.listen_port, 3072);
        assert_eq!(config.heartbeat_interval_secs, 100);
        assert_eq!(config.flush_quiet_ms, 2000);
        assert_eq!(config.zone_device_class, "door");
    }

    #[test]
    fn test_type1_identifier_is_trailing_digits() {
        let config = BridgeConfig::builder()
            .integration_id("123456789012")
            .build();
        assert_eq!(config.type1_identifier(), "56789012");
    }

    #[test]
    fn test_validate() {
        let config = BridgeConfig::builder()
            .integration_id("123456789012")
            .type1_access_code("12345678")
            .build();
        assert!(config.validate().is_ok());

        let bad_id = BridgeConfig::builder()
            .integration_id("12345")
            .type1_access_code("12345678")
            .build();
        assert!(bad_id.validate().is_err());

        let no_codes = BridgeConfig::builder()
            .integration_id("123456789012")
            .build();
        assert!(no_codes.validate().is_err());

        let bad_type2 = BridgeConfig::builder()
            .integration_id("123456789012")
            .type2_access_code("zz")
            .build();
        assert!(bad_type2.validate().is_err());
    }

    #[test]
    fn test_persist_roundtrip_preserves_other_sections() {
        let dir = std::env::temp_dir().join(format!("tlink-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{ "Other.Section": { "keep": true } }"#,
        )
        .unwrap();

        let config = BridgeConfig::builder()
            .integration_id("123456789012")
            .type2_access_code(&"ab".repeat(16))
            .listen_port(4000)
            .build();
        config.save(&path).unwrap();

        let loaded = BridgeConfig::load(&path).unwrap();
        assert_eq!(loaded.listen_port, 4000);
        assert_eq!(loaded.integration_id, "123456789012");

        let text = std::fs::read_to_string(&path).unwrap();
        let root: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(root["Other.Section"]["keep"], true);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let loaded = BridgeConfig::load("/nonexistent/persist/config.json").unwrap();
        assert_eq!(loaded.listen_port, 3072);
    }
}
