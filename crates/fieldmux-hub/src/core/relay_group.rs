//! Relay Group (C5).
//!
//! Holds N Media Relays sharing the same ingress URL, one per destination.

use futures::future::join_all;

use super::relay::{Relay, RelayConfig, RelayStatus};

#[derive(Debug, Clone)]
pub struct RelayGroupStatus {
    pub total: u32,
    pub active: u32,
    pub relays: Vec<RelayStatus>,
}

pub struct RelayGroup {
    ingress_url: String,
    relays: Vec<Relay>,
}

impl RelayGroup {
    pub fn new(ingress_url: impl Into<String>) -> Self {
        Self {
            ingress_url: ingress_url.into(),
            relays: Vec::new(),
        }
    }

    pub fn add_destination(&mut self, name: impl Into<String>, rtmp_url: impl Into<String>, transmux: bool) {
        self.relays.push(Relay::new(RelayConfig {
            name: name.into(),
            ingress_url: self.ingress_url.clone(),
            rtmp_url: rtmp_url.into(),
            transmux,
        }));
    }

    /// Start every relay concurrently. An individual relay failing to
    /// start is not fatal to the group (§4.6) — check `status()`.
    pub fn start_all(&mut self) {
        for relay in &mut self.relays {
            relay.start();
        }
    }

    pub async fn stop_all(&mut self) {
        join_all(self.relays.iter_mut().map(|r| r.stop())).await;
    }

    pub fn status(&self) -> RelayGroupStatus {
        let relays: Vec<RelayStatus> = self.relays.iter().map(|r| r.status()).collect();
        let active = relays.iter().filter(|r| r.active).count() as u32;
        RelayGroupStatus {
            total: relays.len() as u32,
            active,
            relays,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_aggregates_across_relays() {
        let mut group = RelayGroup::new("srt://127.0.0.1:9000?mode=listener");
        group.add_destination("youtube", "rtmp://a.example.com/app/key1", true);
        group.add_destination("twitch", "rtmp://b.example.com/app/key2", true);
        assert_eq!(group.status().total, 2);
        group.stop_all().await;
    }

    #[test]
    fn empty_group_reports_empty() {
        let group = RelayGroup::new("srt://127.0.0.1:9000?mode=listener");
        assert!(group.is_empty());
    }
}
