//! Streamer Pipeline (C6).
//!
//! One per streamer, created by the telemetry hub on field connect. Binds
//! the port allocator (C1), an SRT receiver group (C3), and a relay group
//! (C5) into a single lifecycle.

use fieldmux_common::models::StreamDestination;

use super::port_allocator::PortAllocator;
use super::relay_group::{RelayGroup, RelayGroupStatus};
use super::srt_group::{SrtGroup, SrtGroupConfig, SrtGroupStatus};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_links: u32,
    pub latency_ms: u32,
    pub passphrase: String,
}

pub struct PipelineStatus {
    pub port: u16,
    pub ingest: SrtGroupStatus,
    pub relays: Option<RelayGroupStatus>,
}

pub struct StreamerPipeline {
    streamer_id: String,
    port: u16,
    ingest: SrtGroup,
    relays: Option<RelayGroup>,
}

impl StreamerPipeline {
    /// Bring up a pipeline for `streamer_id`: allocate a port, open the
    /// ingest group, and — if any destination is enabled — start relays.
    /// Ingest always runs even with zero destinations (§4.6 step 3).
    pub fn start(
        streamer_id: &str,
        destinations: &[StreamDestination],
        config: &PipelineConfig,
        ports: &PortAllocator,
    ) -> Self {
        let port = ports.allocate(streamer_id);

        let ingest = SrtGroup::start(SrtGroupConfig {
            base_port: port,
            max_links: config.max_links,
            latency_ms: config.latency_ms,
            passphrase: config.passphrase.clone(),
        });

        let enabled: Vec<&StreamDestination> = destinations
            .iter()
            .filter(|d| d.enabled && !d.rtmp_url.is_empty())
            .collect();

        let relays = if enabled.is_empty() {
            tracing::info!(streamer_id, "pipeline started with no active destinations, ingest only");
            None
        } else {
            let ingress_url = format!("srt://127.0.0.1:{port}?mode=listener");
            let mut group = RelayGroup::new(ingress_url);
            for dest in enabled {
                group.add_destination(dest.platform.clone(), dest.rtmp_url.clone(), true);
            }
            group.start_all();
            Some(group)
        };

        tracing::info!(streamer_id, port, "pipeline started");

        Self {
            streamer_id: streamer_id.to_string(),
            port,
            ingest,
            relays,
        }
    }

    /// Tear down the pipeline: stop relays, stop ingest, release the port.
    /// Idempotent — safe to call once ownership has already unwound.
    pub async fn stop(&mut self, ports: &PortAllocator) {
        if let Some(mut relays) = self.relays.take() {
            relays.stop_all().await;
        }
        self.ingest.stop().await;
        ports.release(&self.streamer_id);
        tracing::info!(streamer_id = %self.streamer_id, "pipeline stopped");
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            port: self.port,
            ingest: self.ingest.status(),
            relays: self.relays.as_ref().map(|r| r.status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::port_allocator::PortAllocatorConfig;

    fn config() -> PipelineConfig {
        PipelineConfig {
            max_links: 2,
            latency_ms: 500,
            passphrase: String::new(),
        }
    }

    #[tokio::test]
    async fn pipeline_with_no_destinations_still_opens_ingest() {
        let ports = PortAllocator::new(PortAllocatorConfig::default());
        let mut pipeline = StreamerPipeline::start("s1", &[], &config(), &ports);
        assert!(ports.get("s1").is_some());
        assert_eq!(pipeline.status().ingest.total_links, 2);
        assert!(pipeline.status().relays.is_none());
        pipeline.stop(&ports).await;
        assert!(ports.get("s1").is_none());
    }

    #[tokio::test]
    async fn disabled_destinations_are_excluded_from_relay_group() {
        let ports = PortAllocator::new(PortAllocatorConfig::default());
        let destinations = vec![StreamDestination {
            platform: "youtube".into(),
            rtmp_url: "rtmp://example.com/app/key".into(),
            enabled: false,
        }];
        let mut pipeline = StreamerPipeline::start("s2", &destinations, &config(), &ports);
        assert!(pipeline.status().relays.is_none());
        pipeline.stop(&ports).await;
    }

    #[tokio::test]
    async fn enabled_destination_starts_a_relay_group() {
        let ports = PortAllocator::new(PortAllocatorConfig::default());
        let destinations = vec![StreamDestination {
            platform: "youtube".into(),
            rtmp_url: "rtmp://example.com/app/key".into(),
            enabled: true,
        }];
        let mut pipeline = StreamerPipeline::start("s3", &destinations, &config(), &ports);
        assert_eq!(pipeline.status().relays.unwrap().total, 1);
        pipeline.stop(&ports).await;
    }
}
