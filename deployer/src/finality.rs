//! Bounded polling for transaction finalization.
use std::{future::Future, time::Duration};

use alloy::primitives::TxHash;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::{network::Network, Error, Result};

/// How a pending transaction (or any other on-chain condition) is polled.
///
/// The delay between attempts starts at `initial_backoff` and doubles up to
/// `max_backoff`; polling gives up once `timeout` has elapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalityPolicy {
    /// Delay after the first unsuccessful attempt.
    pub initial_backoff: Duration,
    /// Upper bound of the delay between attempts.
    pub max_backoff: Duration,
    /// Total time allowed before giving up.
    pub timeout: Duration,
}

impl Default for FinalityPolicy {
    fn default() -> Self {
        FinalityPolicy {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            timeout: Duration::from_secs(120),
        }
    }
}

impl FinalityPolicy {
    /// Same policy with a different overall timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

/// Runs `probe` until it returns `Some`, backing off between attempts.
///
/// Returns `Ok(None)` when the policy's timeout elapses first, including
/// while an attempt is still in flight. Errors from `probe` are returned
/// immediately.
///
/// # Errors
///
/// Propagates the first error returned by `probe`.
pub async fn poll<T, F, Fut>(
    policy: &FinalityPolicy,
    mut probe: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut backoff = policy.initial_backoff;
    loop {
        let remaining = policy.timeout.saturating_sub(started.elapsed());
        match timeout(remaining, probe()).await {
            Ok(outcome) => {
                if let Some(value) = outcome? {
                    return Ok(Some(value));
                }
            }
            Err(_) => {
                debug!(?remaining, "attempt outlived the timeout");
                return Ok(None);
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            return Ok(None);
        }

        sleep(backoff.min(policy.timeout - elapsed)).await;
        backoff = policy.next_backoff(backoff);
    }
}

/// Blocks until the transaction `hash` has a receipt.
///
/// # Errors
///
/// May fail if:
/// - the receipt reports a failed execution ([`Error::TransactionFailed`]);
/// - no receipt appears before the timeout
///   ([`Error::FinalizationTimeout`]);
/// - the node cannot be queried.
pub async fn wait_finalized<N: Network>(
    network: &N,
    hash: TxHash,
    policy: &FinalityPolicy,
) -> Result<()> {
    let started = Instant::now();
    let status = poll(policy, move || async move {
        let status = network.receipt_status(hash).await?;
        if status.is_none() {
            debug!(%hash, "transaction still pending");
        }
        Ok(status)
    })
    .await?;

    match status {
        Some(true) => Ok(()),
        Some(false) => Err(Error::TransactionFailed(hash)),
        None => Err(Error::FinalizationTimeout {
            hash,
            elapsed: started.elapsed(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use alloy::primitives::B256;

    use super::*;
    use crate::testing::MockNetwork;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = FinalityPolicy::default();
        let mut backoff = policy.initial_backoff;
        let mut delays = vec![];
        for _ in 0..7 {
            delays.push(backoff);
            backoff = policy.next_backoff(backoff);
        }

        let millis: Vec<u128> = delays.iter().map(Duration::as_millis).collect();
        assert_eq!(millis, [250, 500, 1000, 2000, 4000, 4000, 4000]);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_first_hit() {
        let attempts = Cell::new(0);
        let value = poll(&FinalityPolicy::default(), || {
            attempts.set(attempts.get() + 1);
            let hit = attempts.get() == 3;
            async move { Ok(hit.then_some(7)) }
        })
        .await
        .unwrap();

        assert_eq!(value, Some(7));
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_gives_up_after_timeout() {
        let policy =
            FinalityPolicy::default().with_timeout(Duration::from_secs(10));
        let started = Instant::now();
        let value: Option<()> =
            poll(&policy, || async { Ok(None) }).await.unwrap();

        assert_eq!(value, None);
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_attempt_is_cut_off() {
        let policy =
            FinalityPolicy::default().with_timeout(Duration::from_secs(5));
        let started = Instant::now();

        let value: Option<()> = tokio::time::timeout(
            Duration::from_secs(3600),
            poll(&policy, || std::future::pending()),
        )
        .await
        .expect("poll should honour its own timeout")
        .unwrap();

        assert_eq!(value, None);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_receipt_query_times_out() {
        let network = MockNetwork::default();
        let hash = network.stalled_transaction();
        let policy =
            FinalityPolicy::default().with_timeout(Duration::from_secs(3));

        let err = wait_finalized(&network, hash, &policy)
            .await
            .expect_err("should time out");
        assert!(matches!(err, Error::FinalizationTimeout { hash: h, .. } if h == hash));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_pending_receipts() {
        let network = MockNetwork::default();
        let hash = network.pending_transaction(3);

        wait_finalized(&network, hash, &FinalityPolicy::default())
            .await
            .expect("should finalize after a few polls");
        assert_eq!(network.receipt_queries(hash), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_transaction_times_out() {
        let network = MockNetwork::default();
        let policy =
            FinalityPolicy::default().with_timeout(Duration::from_secs(3));

        let err = wait_finalized(&network, B256::repeat_byte(0xab), &policy)
            .await
            .expect_err("should time out");
        assert!(matches!(err, Error::FinalizationTimeout { .. }));
    }

    #[tokio::test]
    async fn reverted_transaction_fails() {
        let network = MockNetwork::default();
        let hash = network.reverted_transaction();

        let err = wait_finalized(&network, hash, &FinalityPolicy::default())
            .await
            .expect_err("should report the revert");
        assert!(matches!(err, Error::TransactionFailed(h) if h == hash));
    }
}
