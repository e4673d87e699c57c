//! Data model shared between the telemetry hub and its collaborators.
//!
//! These types mirror the snapshot field schemas literally: field names
//! and units live in the variable name itself (`rtt_ms`, `speed_kmh`,
//! `download_mbps`, `obstruction_pct`, `loss_pct`) so the wire JSON needs
//! no translation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Streamer identity ───────────────────────────────────────────────

/// A registered streamer account, as held by the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerRecord {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub color: String,
    pub socials: Vec<String>,
    pub approved: bool,
    /// Write-scoped credential: presented by the field agent.
    #[serde(skip_serializing)]
    pub write_credential: String,
    /// Read-scoped credential: presented by overlay clients.
    #[serde(skip_serializing)]
    pub read_credential: String,
    pub destinations: Vec<StreamDestination>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a [`StreamerRecord`] with both credentials stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerPublic {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub color: String,
    pub approved: bool,
    pub socials: Vec<String>,
}

impl From<&StreamerRecord> for StreamerPublic {
    fn from(r: &StreamerRecord) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            avatar_url: r.avatar_url.clone(),
            color: r.color.clone(),
            approved: r.approved,
            socials: r.socials.clone(),
        }
    }
}

/// A configured relay destination, read at pipeline start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDestination {
    /// Free-form platform tag (e.g. "youtube", "twitch", "custom").
    pub platform: String,
    pub rtmp_url: String,
    pub enabled: bool,
}

// ── GPS ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    None,
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

impl Default for FixKind {
    fn default() -> Self {
        FixKind::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub speed_kmh: f64,
    #[serde(default)]
    pub altitude_m: f64,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub satellites: u32,
    #[serde(default)]
    pub fix: FixKind,
}

impl Default for GpsFix {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lng: 0.0,
            speed_kmh: 0.0,
            altitude_m: 0.0,
            heading: 0.0,
            satellites: 0,
            fix: FixKind::None,
        }
    }
}

// ── Hardware ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct HardwareMetrics {
    #[serde(default)]
    pub cpu_percent: f32,
    #[serde(default)]
    pub cpu_temp_c: f32,
    #[serde(default)]
    pub ram_percent: f32,
    #[serde(default)]
    pub disk_percent: f32,
    #[serde(default)]
    pub battery_percent: Option<f32>,
    #[serde(default)]
    pub battery_charging: bool,
}

// ── Network links ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    #[serde(rename = "4g")]
    FourG,
    Wifi,
    Ethernet,
    Vpn,
    Starlink,
    Unknown,
}

impl Default for LinkKind {
    fn default() -> Self {
        LinkKind::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLink {
    pub interface: String,
    #[serde(rename = "type", default)]
    pub kind: LinkKind,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub rtt_ms: f64,
    #[serde(default)]
    pub jitter_ms: f64,
    #[serde(default)]
    pub loss_pct: f64,
    #[serde(default)]
    pub bandwidth_mbps: f64,
    #[serde(default)]
    pub score: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkLinksPayload {
    pub links: Vec<NetworkLink>,
}

// ── Starlink ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StarlinkMetrics {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub download_mbps: f64,
    #[serde(default)]
    pub upload_mbps: f64,
    #[serde(default)]
    pub obstruction_pct: f64,
    #[serde(default)]
    pub uptime_s: u64,
}

// ── Health ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
    Down,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Critical => write!(f, "critical"),
            HealthState::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub score: u8,
    pub state: HealthState,
    #[serde(default)]
    pub active_links: u32,
    #[serde(default)]
    pub total_links: u32,
    #[serde(default)]
    pub bitrate_kbps: f64,
    #[serde(default)]
    pub message: String,
}

impl Default for HealthStatus {
    /// Initial health state is DOWN (§4.7) until the first evaluation runs.
    fn default() -> Self {
        Self {
            score: 0,
            state: HealthState::Down,
            active_links: 0,
            total_links: 0,
            bitrate_kbps: 0.0,
            message: String::new(),
        }
    }
}

// ── Live snapshot ───────────────────────────────────────────────────

/// The live telemetry snapshot for one connected streamer. Exists only
/// while a field uplink is open (§3 invariants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub streamer_id: String,
    pub name: String,
    pub avatar_url: String,
    pub color: String,
    pub socials: Vec<String>,
    #[serde(default)]
    pub gps: GpsFix,
    #[serde(default)]
    pub hardware: HardwareMetrics,
    #[serde(default)]
    pub network_links: Vec<NetworkLink>,
    #[serde(default)]
    pub starlink: StarlinkMetrics,
    #[serde(default)]
    pub health: HealthStatus,
    pub location_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LiveSnapshot {
    /// Construct a fresh snapshot from a streamer record, with every
    /// telemetry field at its default until the field agent reports in.
    pub fn from_record(record: &StreamerRecord) -> Self {
        Self {
            streamer_id: record.id.clone(),
            name: record.name.clone(),
            avatar_url: record.avatar_url.clone(),
            color: record.color.clone(),
            socials: record.socials.clone(),
            gps: GpsFix::default(),
            hardware: HardwareMetrics::default(),
            network_links: Vec::new(),
            starlink: StarlinkMetrics::default(),
            health: HealthStatus::default(),
            location_name: None,
            updated_at: Utc::now(),
        }
    }
}
