//! SRT Link Receiver (C2).
//!
//! Owns one listener on one port. Spawns a child process that exposes an
//! SRT listener and emits the MPEG-TS payload to a loopback UDP sink at
//! `port + 1000`. If the child binary is absent, `start()` still succeeds
//! in simulated mode (§4.2) rather than failing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::supervisor::{Supervisor, SupervisorSpec};

const SRT_BINARY: &str = "srt-live-transmit";

#[derive(Debug, Clone)]
pub struct SrtLinkConfig {
    pub link_id: u32,
    pub port: u16,
    pub latency_ms: u32,
    pub passphrase: String,
}

/// Telemetry updated either by parsing the child's verbose output or by
/// external reporting (§4.2, §9 open question — this rewrite leaves
/// `record_stats` as the hook a future parser would call).
#[derive(Debug, Clone, Copy, Default)]
struct Telemetry {
    last_seen: Option<Instant>,
    rtt_ms: f64,
    loss_pct: f64,
    bitrate_kbps: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrtLinkStatus {
    pub link_id: u32,
    pub port: u16,
    pub active: bool,
    pub score: u8,
    pub rtt_ms: f64,
    pub loss_pct: f64,
    pub bitrate_kbps: f64,
}

pub struct SrtLink {
    config: SrtLinkConfig,
    supervisor: Option<Supervisor>,
    telemetry: Mutex<Telemetry>,
}

fn build_args(config: &SrtLinkConfig) -> Vec<String> {
    let mut params = format!("mode=listener&latency={}", config.latency_ms * 1000);
    if !config.passphrase.is_empty() {
        params.push_str(&format!("&passphrase={}", config.passphrase));
    }
    let srt_url = format!("srt://0.0.0.0:{}?{}", config.port, params);
    let udp_sink = format!("udp://127.0.0.1:{}", config.port as u32 + 1000);
    vec![srt_url, udp_sink, "-v".to_string()]
}

impl SrtLink {
    pub fn new(config: SrtLinkConfig) -> Self {
        Self {
            config,
            supervisor: None,
            telemetry: Mutex::new(Telemetry::default()),
        }
    }

    /// Transition `stopped -> listening`. Spawns the supervised child.
    pub fn start(&mut self) {
        let spec = SupervisorSpec::new(
            format!("srt-link-{}", self.config.link_id),
            SRT_BINARY,
            build_args(&self.config),
        );
        self.telemetry.lock().unwrap().last_seen = Some(Instant::now());
        self.supervisor = Some(Supervisor::start(spec));
        tracing::info!(link_id = self.config.link_id, port = self.config.port, "srt link starting");
    }

    pub async fn stop(&mut self) {
        if let Some(mut sup) = self.supervisor.take() {
            sup.stop().await;
        }
    }

    pub fn is_active(&self) -> bool {
        self.supervisor
            .as_ref()
            .map(|s| s.status().active)
            .unwrap_or(false)
    }

    /// Record fresh statistics for this link (§4.2: the hook a parser of
    /// the child's verbose output would call).
    pub fn record_stats(&self, rtt_ms: f64, loss_pct: f64, bitrate_kbps: f64) {
        let mut t = self.telemetry.lock().unwrap();
        t.last_seen = Some(Instant::now());
        t.rtt_ms = rtt_ms;
        t.loss_pct = loss_pct;
        t.bitrate_kbps = bitrate_kbps;
    }

    /// Recompute this link's quality score from its statistics (§4.3 rubric).
    pub fn score(&self) -> u8 {
        if !self.is_active() {
            return 0;
        }
        let t = *self.telemetry.lock().unwrap();
        let staleness = t
            .last_seen
            .map(|ts| ts.elapsed())
            .unwrap_or(Duration::from_secs(u64::MAX / 2));

        if staleness > Duration::from_secs(10) {
            return 0;
        }

        let mut score: i32 = 100;
        if staleness > Duration::from_secs(5) {
            score -= 30;
        }
        if t.rtt_ms > 200.0 {
            score -= 30;
        } else if t.rtt_ms > 100.0 {
            score -= 15;
        }
        if t.loss_pct > 5.0 {
            score -= 30;
        } else if t.loss_pct > 1.0 {
            score -= 10;
        }
        score.clamp(0, 100) as u8
    }

    pub fn status(&self) -> SrtLinkStatus {
        let t = *self.telemetry.lock().unwrap();
        SrtLinkStatus {
            link_id: self.config.link_id,
            port: self.config.port,
            active: self.is_active(),
            score: self.score(),
            rtt_ms: t.rtt_ms,
            loss_pct: t.loss_pct,
            bitrate_kbps: t.bitrate_kbps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SrtLinkConfig {
        SrtLinkConfig {
            link_id: 0,
            port: 9000,
            latency_ms: 500,
            passphrase: String::new(),
        }
    }

    #[test]
    fn build_args_contains_listener_mode_and_udp_sink() {
        let args = build_args(&config());
        assert!(args[0].starts_with("srt://0.0.0.0:9000?mode=listener&latency=500000"));
        assert_eq!(args[1], "udp://127.0.0.1:10000");
    }

    #[test]
    fn build_args_includes_passphrase_when_set() {
        let mut c = config();
        c.passphrase = "s3cr3t".into();
        let args = build_args(&c);
        assert!(args[0].contains("&passphrase=s3cr3t"));
    }

    #[test]
    fn score_is_zero_when_never_started() {
        let link = SrtLink::new(config());
        assert_eq!(link.score(), 0);
    }

    #[tokio::test]
    async fn simulated_mode_reports_inactive_well_formed_status() {
        // srt-live-transmit is virtually never installed in a test sandbox,
        // so this also exercises the real-world default path.
        let mut link = SrtLink::new(config());
        link.start();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let status = link.status();
        assert!(!status.active);
        assert_eq!(status.score, 0);
        link.stop().await;
    }

    #[test]
    fn record_stats_updates_telemetry_and_affects_score_shape() {
        let link = SrtLink::new(config());
        link.record_stats(50.0, 0.2, 3000.0);
        let t = *link.telemetry.lock().unwrap();
        assert_eq!(t.rtt_ms, 50.0);
        assert_eq!(t.loss_pct, 0.2);
        assert_eq!(t.bitrate_kbps, 3000.0);
    }
}
