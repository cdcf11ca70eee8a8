//! Waiting for a freshly created keyspace to reach the whole cluster.
//!
//! By default the waiter sleeps for a fixed time per node in the ring, which gives
//! schema gossip a chance to finish before any table is created. This is a
//! heuristic: on a slow network the wait may be too short. Alternatively the
//! waiter can poll the nodes until they report the same schema version.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::ClusterClient;
use crate::errors::PropagationError;

/// Wait per ring node used by [`PropagationStrategy::default`].
pub const DEFAULT_PER_NODE_DELAY: Duration = Duration::from_millis(1000);
/// Pause between two schema agreement checks.
pub const DEFAULT_AGREEMENT_INTERVAL: Duration = Duration::from_millis(200);
/// How long schema agreement is polled for before giving up.
pub const DEFAULT_AGREEMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// How to wait after the keyspace was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropagationStrategy {
    /// Sleep for `per_node` times the ring size.
    FixedPerNode {
        /// Wait per node in the keyspace's ring.
        per_node: Duration,
    },
    /// Check for schema agreement every `interval` until it is reached or
    /// `timeout` elapses. Reaching the timeout is logged, not fatal.
    SchemaAgreement {
        /// Pause between checks.
        interval: Duration,
        /// Total time to keep checking.
        timeout: Duration,
    },
}

impl PropagationStrategy {
    /// Schema agreement polling with the default interval and timeout.
    pub fn schema_agreement() -> Self {
        Self::schema_agreement_with_timeout(DEFAULT_AGREEMENT_TIMEOUT)
    }

    /// Schema agreement polling with the default interval.
    pub fn schema_agreement_with_timeout(timeout: Duration) -> Self {
        PropagationStrategy::SchemaAgreement {
            interval: DEFAULT_AGREEMENT_INTERVAL,
            timeout,
        }
    }
}

impl Default for PropagationStrategy {
    fn default() -> Self {
        PropagationStrategy::FixedPerNode {
            per_node: DEFAULT_PER_NODE_DELAY,
        }
    }
}

/// Blocks the workflow until a new keyspace can be expected on every node.
#[derive(Clone, Debug, Default)]
pub struct PropagationWaiter {
    strategy: PropagationStrategy,
}

impl PropagationWaiter {
    /// Creates a waiter using `strategy`.
    pub fn new(strategy: PropagationStrategy) -> Self {
        PropagationWaiter { strategy }
    }

    /// The strategy this waiter follows.
    pub fn strategy(&self) -> PropagationStrategy {
        self.strategy
    }

    /// Waits for `keyspace` to propagate. Ctrl-C aborts the wait with
    /// [`PropagationError::Interrupted`].
    pub async fn await_propagation<C>(
        &self,
        client: &C,
        keyspace: &str,
    ) -> Result<(), PropagationError>
    where
        C: ClusterClient + ?Sized,
    {
        self.await_propagation_or_interrupt(client, keyspace, ctrl_c())
            .await
    }

    /// Waits for `keyspace` to propagate, failing with
    /// [`PropagationError::Interrupted`] as soon as `interrupt` completes.
    pub async fn await_propagation_or_interrupt<C, I>(
        &self,
        client: &C,
        keyspace: &str,
        interrupt: I,
    ) -> Result<(), PropagationError>
    where
        C: ClusterClient + ?Sized,
        I: Future<Output = ()>,
    {
        let wait = async {
            match self.strategy {
                PropagationStrategy::FixedPerNode { per_node } => {
                    fixed_wait(client, keyspace, per_node).await
                }
                PropagationStrategy::SchemaAgreement { interval, timeout } => {
                    poll_agreement(client, interval, timeout).await;
                    Ok(())
                }
            }
        };

        tokio::select! {
            res = wait => res,
            () = interrupt => {
                warn!("Interrupted while waiting for keyspace {} to propagate", keyspace);
                Err(PropagationError::Interrupted)
            }
        }
    }
}

async fn fixed_wait<C>(
    client: &C,
    keyspace: &str,
    per_node: Duration,
) -> Result<(), PropagationError>
where
    C: ClusterClient + ?Sized,
{
    let ring_size = client
        .ring_size(keyspace)
        .await
        .map_err(|source| PropagationError::Topology {
            keyspace: keyspace.to_owned(),
            source,
        })?;

    let delay = per_node.saturating_mul(u32::try_from(ring_size).unwrap_or(u32::MAX));
    info!(
        "Waiting {:?} for keyspace {} to reach {} node(s)",
        delay, keyspace, ring_size
    );
    tokio::time::sleep(delay).await;
    Ok(())
}

async fn poll_agreement<C>(client: &C, interval: Duration, timeout: Duration)
where
    C: ClusterClient + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        match client.check_schema_agreement().await {
            Ok(true) => {
                info!("Schema is in agreement");
                return;
            }
            Ok(false) => debug!("Schema is not in agreement yet"),
            Err(err) => warn!("Failed to check schema agreement: {}", err),
        }

        if Instant::now() >= deadline {
            warn!(
                "Schema is NOT in agreement after {:?}, continuing anyway",
                timeout
            );
            return;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Completes on Ctrl-C, or never if the signal can't be listened for.
pub(crate) async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Can't listen for Ctrl-C, the wait won't be interruptible: {}", err);
        std::future::pending::<()>().await;
    }
}
