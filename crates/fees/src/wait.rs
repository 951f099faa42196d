use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use pension_engine_chain::{Clock, EvmClient};

use crate::estimator::FeeError;

/// Poll the node gas price until it drops to `ceiling_wei` or below.
///
/// Bounded by `max_wait`: when the ceiling is not reached in time the
/// loop ends with [`FeeError::WaitTimeout`]. Sleeping goes through the
/// injected clock so tests can simulate elapsed time.
pub async fn wait_for_fee_below(
    client: &Arc<dyn EvmClient>,
    clock: &Arc<dyn Clock>,
    ceiling_wei: u128,
    max_wait: Duration,
    poll_interval: Duration,
) -> Result<u128, FeeError> {
    let started = clock.now_millis();
    let deadline = started + max_wait.as_millis() as u64;

    loop {
        let price = client.gas_price().await?;
        if price <= ceiling_wei {
            info!(price, ceiling_wei, "Gas price under ceiling");
            return Ok(price);
        }

        let now = clock.now_millis();
        if now >= deadline {
            return Err(FeeError::WaitTimeout {
                ceiling_wei,
                waited_ms: now - started,
            });
        }

        debug!(price, ceiling_wei, "Gas price above ceiling, waiting");
        clock.sleep(poll_interval).await;
    }
}
