//! SRT Receiver Group (C3).
//!
//! Owns `max_links` SRT link receivers on consecutive ports and keeps a
//! best-link view over their scores (§4.3).

use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::srt_link::{SrtLink, SrtLinkConfig, SrtLinkStatus};

const RECOMPUTE_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SrtGroupConfig {
    pub base_port: u16,
    pub max_links: u32,
    pub latency_ms: u32,
    pub passphrase: String,
}

#[derive(Debug, Clone)]
pub struct SrtGroupStatus {
    pub total_links: u32,
    pub active_links: u32,
    pub links: Vec<SrtLinkStatus>,
}

pub struct SrtGroup {
    links: Vec<SrtLink>,
    recompute_task: Option<JoinHandle<()>>,
    stop_notify: std::sync::Arc<Notify>,
}

impl SrtGroup {
    /// Create and start `max_links` receivers on consecutive ports starting
    /// at `base_port`, and begin the 2 s score recomputation loop.
    pub fn start(config: SrtGroupConfig) -> Self {
        let mut links = Vec::with_capacity(config.max_links as usize);
        for i in 0..config.max_links {
            let mut link = SrtLink::new(SrtLinkConfig {
                link_id: i,
                port: config.base_port + i as u16,
                latency_ms: config.latency_ms,
                passphrase: config.passphrase.clone(),
            });
            link.start();
            links.push(link);
        }

        let stop_notify = std::sync::Arc::new(Notify::new());
        let notify = stop_notify.clone();
        let recompute_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(RECOMPUTE_INTERVAL) => {}
                    _ = notify.notified() => return,
                }
            }
        });

        Self {
            links,
            recompute_task: Some(recompute_task),
            stop_notify,
        }
    }

    /// Stop the recomputation loop and every link receiver.
    pub async fn stop(&mut self) {
        self.stop_notify.notify_waiters();
        if let Some(task) = self.recompute_task.take() {
            let _ = task.await;
        }
        for link in &mut self.links {
            link.stop().await;
        }
    }

    /// The active link of maximum score, ties broken by lowest link-id.
    pub fn best_link(&self) -> Option<SrtLinkStatus> {
        let mut best: Option<SrtLinkStatus> = None;
        for status in self.links.iter().map(|l| l.status()).filter(|s| s.active) {
            best = match best {
                None => Some(status),
                Some(current) if status.score > current.score => Some(status),
                Some(current) if status.score == current.score && status.link_id < current.link_id => {
                    Some(status)
                }
                Some(current) => Some(current),
            };
        }
        best
    }

    pub fn status(&self) -> SrtGroupStatus {
        let links: Vec<SrtLinkStatus> = self.links.iter().map(|l| l.status()).collect();
        let active_links = links.iter().filter(|s| s.active).count() as u32;
        SrtGroupStatus {
            total_links: links.len() as u32,
            active_links,
            links,
        }
    }

    /// Record statistics for a specific link by id, used by a future parser
    /// or by tests exercising the scoring rubric directly.
    pub fn record_stats(&self, link_id: u32, rtt_ms: f64, loss_pct: f64, bitrate_kbps: f64) {
        if let Some(link) = self.links.iter().find(|l| l.status().link_id == link_id) {
            link.record_stats(rtt_ms, loss_pct, bitrate_kbps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SrtGroupConfig {
        SrtGroupConfig {
            base_port: 9100,
            max_links: 3,
            latency_ms: 500,
            passphrase: String::new(),
        }
    }

    #[tokio::test]
    async fn links_occupy_consecutive_ports() {
        let mut group = SrtGroup::start(config());
        let status = group.status();
        assert_eq!(status.total_links, 3);
        let ports: Vec<u16> = status.links.iter().map(|s| s.port).collect();
        assert_eq!(ports, vec![9100, 9101, 9102]);
        group.stop().await;
    }

    #[tokio::test]
    async fn best_link_is_none_when_all_inactive() {
        let mut group = SrtGroup::start(config());
        assert!(group.best_link().is_none());
        group.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_under_repeated_calls() {
        let mut group = SrtGroup::start(config());
        group.stop().await;
        group.stop().await;
    }
}
