//! Typed configuration, loaded from a TOML file merged with environment
//! variables grouped by an 8-prefix scheme (`SRT_`, `RTMP_`, `OBS_`,
//! `FIELD_`, `HEALTH_`, `DATABASE_`, `ADMIN_`, `DASHBOARD_`).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub srt: SrtConfig,
    pub rtmp: RtmpConfig,
    pub obs: ObsSettings,
    pub field: FieldConfig,
    pub health: HealthSettings,
    pub database: DatabaseConfig,
    pub admin: AdminConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrtConfig {
    pub base_port: u16,
    pub latency_ms: u32,
    pub max_links: u32,
    pub passphrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtmpConfig {
    pub primary_url: String,
    pub secondary_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsSettings {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub scene_live: String,
    pub scene_brb: String,
    pub fallback_delay_s: f64,
    pub recovery_delay_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub telemetry_interval_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    pub threshold_degraded: u8,
    pub threshold_critical: u8,
    pub threshold_down: u8,
    pub check_interval_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub auto_approve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            srt: SrtConfig {
                base_port: 9000,
                latency_ms: 500,
                max_links: 4,
                passphrase: String::new(),
            },
            rtmp: RtmpConfig {
                primary_url: String::new(),
                secondary_url: String::new(),
            },
            obs: ObsSettings {
                host: "localhost".to_string(),
                port: 4455,
                password: String::new(),
                scene_live: "LIVE".to_string(),
                scene_brb: "BRB".to_string(),
                fallback_delay_s: 3.0,
                recovery_delay_s: 5.0,
            },
            field: FieldConfig {
                telemetry_interval_s: 1.0,
            },
            health: HealthSettings {
                threshold_degraded: 70,
                threshold_critical: 40,
                threshold_down: 10,
                check_interval_s: 2.0,
            },
            database: DatabaseConfig {
                path: "fieldmux.db".to_string(),
                auto_approve: false,
            },
            admin: AdminConfig {
                token: String::new(),
            },
            dashboard: DashboardConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
        }
    }
}

const PREFIXES: &[&str] = &[
    "srt", "rtmp", "obs", "field", "health", "database", "admin", "dashboard",
];

impl Config {
    /// Load from `FIELDMUX_CONFIG` (default `fieldmux.toml`), then layer
    /// environment variables on top, grouped by prefix onto their nested
    /// table (e.g. `SRT_BASE_PORT` -> `srt.base_port`).
    pub fn load() -> Result<Self, figment::Error> {
        let path = std::env::var("FIELDMUX_CONFIG").unwrap_or_else(|_| "fieldmux.toml".to_string());

        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if std::path::Path::new(&path).exists() {
            figment = figment.merge(Toml::file(&path));
        }

        for group in PREFIXES {
            let env_prefix = format!("{}_", group.to_uppercase());
            let group = group.to_string();
            figment = figment.merge(Env::prefixed(&env_prefix).map(move |key| {
                format!("{}.{}", group, key.as_str().to_lowercase()).into()
            }));
        }

        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.srt.base_port, 9000);
        assert_eq!(config.health.threshold_down, 10);
        assert_eq!(config.dashboard.port, 8000);
    }
}
