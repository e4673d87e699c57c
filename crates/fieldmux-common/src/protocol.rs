//! WebSocket protocol messages between the field agent and the hub, and
//! between the hub and dashboard subscribers.
//!
//! Field messages use a flat envelope with an opaque `data` value so that
//! parse failures are scoped to a single message (§7: input-invalid is
//! logged and dropped, never propagated). Dashboard events are internally
//! tagged so a subscriber never has to guess the payload shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{GpsFix, HardwareMetrics, HealthStatus, LiveSnapshot, StarlinkMetrics};

// ── Field → Hub ─────────────────────────────────────────────────────

/// The known message types a field agent can send. An envelope whose
/// `type` doesn't match one of these still deserializes, as `Unknown`,
/// so a forward-compatible agent never breaks the hub's JSON parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Gps,
    Hardware,
    Network,
    Starlink,
    Health,
    StreamStatus,
    Command,
    #[serde(other)]
    Unknown,
}

/// The field → hub wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEnvelope {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub streamer_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl FieldEnvelope {
    /// Parse `data` into a concrete payload type.
    pub fn parse_data<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkPayload {
    pub links: Vec<crate::models::NetworkLink>,
}

pub type GpsPayload = GpsFix;
pub type HardwarePayload = HardwareMetrics;
pub type StarlinkPayload = StarlinkMetrics;
pub type HealthPayload = HealthStatus;

// ── Hub → Dashboard ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullSyncData {
    pub streamers: Vec<LiveSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerOnlineData {
    pub streamer_id: String,
    pub streamer: LiveSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerUpdateData {
    pub streamer_id: String,
    pub streamer: LiveSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerOfflineData {
    pub streamer_id: String,
}

/// Events pushed to dashboard WebSocket subscribers (§4.9, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DashboardEvent {
    #[serde(rename = "full_sync")]
    FullSync(FullSyncData),
    #[serde(rename = "streamer_online")]
    StreamerOnline(StreamerOnlineData),
    #[serde(rename = "streamer_update")]
    StreamerUpdate(StreamerUpdateData),
    #[serde(rename = "streamer_offline")]
    StreamerOffline(StreamerOfflineData),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HealthState;

    fn sample_envelope(msg_type: &str, data: serde_json::Value) -> String {
        format!(
            r#"{{"type":"{msg_type}","streamer_id":"str_1","timestamp":"2026-01-01T00:00:00Z","data":{data}}}"#
        )
    }

    #[test]
    fn envelope_parses_known_type() {
        let raw = sample_envelope("gps", serde_json::json!({"lat": 1.0, "lng": 2.0}));
        let env: FieldEnvelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(env.msg_type, MessageType::Gps);
        let gps: GpsPayload = env.parse_data().unwrap();
        assert_eq!(gps.lat, 1.0);
    }

    #[test]
    fn envelope_unknown_type_falls_back() {
        let raw = sample_envelope("something.new", serde_json::json!({}));
        let env: FieldEnvelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(env.msg_type, MessageType::Unknown);
    }

    #[test]
    fn network_payload_parses_link_list() {
        let raw = sample_envelope(
            "network",
            serde_json::json!({"links": [{"interface": "wwan0", "type": "4g", "connected": true}]}),
        );
        let env: FieldEnvelope = serde_json::from_str(&raw).unwrap();
        let payload: NetworkPayload = env.parse_data().unwrap();
        assert_eq!(payload.links.len(), 1);
        assert_eq!(payload.links[0].interface, "wwan0");
    }

    #[test]
    fn dashboard_event_full_sync_tagged_serialization() {
        let event = DashboardEvent::FullSync(FullSyncData { streamers: vec![] });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"full_sync\""));
    }

    #[test]
    fn dashboard_event_streamer_offline_round_trip() {
        let event = DashboardEvent::StreamerOffline(StreamerOfflineData {
            streamer_id: "str_1".into(),
        });
        let json = serde_json::to_string(&event).unwrap();
        let recovered: DashboardEvent = serde_json::from_str(&json).unwrap();
        match recovered {
            DashboardEvent::StreamerOffline(data) => assert_eq!(data.streamer_id, "str_1"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn health_payload_round_trip() {
        let raw = sample_envelope(
            "health",
            serde_json::json!({"score": 80, "state": "degraded"}),
        );
        let env: FieldEnvelope = serde_json::from_str(&raw).unwrap();
        let health: HealthPayload = env.parse_data().unwrap();
        assert_eq!(health.state, HealthState::Degraded);
    }
}
