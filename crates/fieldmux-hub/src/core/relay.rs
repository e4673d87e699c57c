//! Media Relay (C4).
//!
//! Supervises a child process that consumes a local ingress URL and emits
//! to a third-party RTMP destination. Transmux-only unless configured
//! otherwise — no re-encode, to preserve CPU and end-to-end latency.

use super::supervisor::{Supervisor, SupervisorSpec};

const RELAY_BINARY: &str = "ffmpeg";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub name: String,
    pub ingress_url: String,
    pub rtmp_url: String,
    pub transmux: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayStatus {
    pub name: String,
    pub active: bool,
    pub restarts: u32,
}

/// Replace the last path segment (the stream key) of an RTMP URL with
/// `***` before it's logged, unless that segment is 4 characters or
/// fewer (§4.4 logging policy).
pub fn mask_rtmp_url(url: &str) -> String {
    match url.rfind('/') {
        Some(idx) => {
            let (head, tail) = url.split_at(idx + 1);
            if tail.len() <= 4 {
                url.to_string()
            } else {
                format!("{head}***")
            }
        }
        None => url.to_string(),
    }
}

fn build_args(config: &RelayConfig) -> Vec<String> {
    let mut args = vec!["-i".to_string(), config.ingress_url.clone()];
    if config.transmux {
        args.extend(["-c".to_string(), "copy".to_string()]);
    }
    args.extend(["-f".to_string(), "flv".to_string(), config.rtmp_url.clone()]);
    args
}

pub struct Relay {
    config: RelayConfig,
    supervisor: Option<Supervisor>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            supervisor: None,
        }
    }

    pub fn start(&mut self) {
        let spec = SupervisorSpec::new(
            self.config.name.clone(),
            RELAY_BINARY,
            build_args(&self.config),
        );
        tracing::info!(
            name = %self.config.name,
            ingress = %self.config.ingress_url,
            rtmp = %mask_rtmp_url(&self.config.rtmp_url),
            "relay starting"
        );
        self.supervisor = Some(Supervisor::start(spec));
    }

    pub async fn stop(&mut self) {
        if let Some(mut sup) = self.supervisor.take() {
            sup.stop().await;
        }
    }

    pub fn status(&self) -> RelayStatus {
        let (active, restarts) = self
            .supervisor
            .as_ref()
            .map(|s| {
                let st = s.status();
                (st.active, st.restarts)
            })
            .unwrap_or((false, 0));
        RelayStatus {
            name: self.config.name.clone(),
            active,
            restarts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_rtmp_url_replaces_long_stream_key() {
        let masked = mask_rtmp_url("rtmp://live.example.com/app/abcdef123456");
        assert_eq!(masked, "rtmp://live.example.com/app/***");
    }

    #[test]
    fn mask_rtmp_url_leaves_short_segment_verbatim() {
        let masked = mask_rtmp_url("rtmp://live.example.com/app/ab12");
        assert_eq!(masked, "rtmp://live.example.com/app/ab12");
    }

    #[test]
    fn mask_rtmp_url_without_slash_is_unchanged() {
        assert_eq!(mask_rtmp_url("not-a-url"), "not-a-url");
    }

    #[test]
    fn build_args_uses_copy_codec_when_transmuxing() {
        let config = RelayConfig {
            name: "r1".into(),
            ingress_url: "srt://127.0.0.1:9000?mode=listener".into(),
            rtmp_url: "rtmp://example.com/app/key".into(),
            transmux: true,
        };
        let args = build_args(&config);
        assert!(args.iter().any(|a| a == "copy"));
    }

    #[tokio::test]
    async fn status_before_start_is_inactive() {
        let relay = Relay::new(RelayConfig {
            name: "r1".into(),
            ingress_url: "srt://127.0.0.1:9000?mode=listener".into(),
            rtmp_url: "rtmp://example.com/app/key".into(),
            transmux: true,
        });
        assert!(!relay.status().active);
    }
}
