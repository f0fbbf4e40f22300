use crate::cluster::ClientSlot;
use crate::config::DiscoveryOptions;
use crate::dialect::DialectClient;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// DiscoveryLoop - finds the admin API dialect spoken by the configured endpoint
///
/// Probes the candidate dialect clients in priority order and binds the first
/// one whose cluster status call succeeds. While nothing answers, the slot is
/// left empty and the whole cycle is retried after `retry_interval`.
///
/// The loop is the only writer of the [`ClientSlot`]. By default it terminates
/// after the first successful bind; with `revalidate_interval` set it keeps
/// re-running the probe sequence and rebinds when a different dialect wins.
pub struct DiscoveryLoop {
    candidates: Vec<Arc<dyn DialectClient>>,
    slot: ClientSlot,
    retry_interval: Duration,
    revalidate_interval: Option<Duration>,
}

impl DiscoveryLoop {
    pub fn new(
        candidates: Vec<Arc<dyn DialectClient>>,
        slot: ClientSlot,
        options: &DiscoveryOptions,
    ) -> Self {
        Self {
            candidates,
            slot,
            retry_interval: options.retry_interval,
            revalidate_interval: options.revalidate_interval,
        }
    }

    /// Start the loop on the tokio runtime; returns immediately.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    pub async fn run(self, cancel: CancellationToken) {
        if !self.bind_first_compatible(&cancel).await {
            info!("cluster discovery cancelled");
            return;
        }

        let Some(interval) = self.revalidate_interval else {
            return;
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cluster revalidation cancelled");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            let found = tokio::select! {
                _ = cancel.cancelled() => return,
                found = self.probe_cycle() => found,
            };

            let current = self.slot.current().await.map(|c| c.dialect());
            match found {
                Some(client) if Some(client.dialect()) != current => {
                    info!(
                        previous = ?current,
                        dialect = %client.dialect(),
                        "cluster dialect changed, rebinding"
                    );
                    self.slot.bind(client).await;
                }
                Some(client) => {
                    debug!(dialect = %client.dialect(), "cluster dialect unchanged");
                }
                None => {
                    warn!(
                        dialect = ?current,
                        "revalidation found no cluster node, keeping current binding"
                    );
                }
            }
        }
    }

    /// Retries probe cycles until one binds. Returns false when cancelled first.
    async fn bind_first_compatible(&self, cancel: &CancellationToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }

            let found = tokio::select! {
                _ = cancel.cancelled() => return false,
                found = self.probe_cycle() => found,
            };

            if let Some(client) = found {
                info!(dialect = %client.dialect(), "cluster client created");
                self.slot.bind(client).await;
                return true;
            }

            self.slot.reset().await;
            warn!(
                error = "no cluster node found",
                retry_in = ?self.retry_interval,
                "couldn't create cluster client, will retry"
            );

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }

    /// One pass over the candidates, in order.
    pub(crate) async fn probe_cycle(&self) -> Option<Arc<dyn DialectClient>> {
        for candidate in &self.candidates {
            match candidate.get_cluster_status().await {
                Ok(_) => return Some(Arc::clone(candidate)),
                Err(e) => {
                    debug!(dialect = %candidate.dialect(), error = %e, "cluster client probe failed");
                }
            }
        }
        None
    }
}
