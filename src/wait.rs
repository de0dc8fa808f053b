//! Waiting for asynchronously rendered lists
//!
//! Child lists render progressively, so a crawl waits for the first
//! child and then lets the rest settle before enumerating. The settle
//! step is a heuristic; [`Settle`] chooses how it is done.

use crate::page::{PageInteraction, PageQuery};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// How to let remaining children render after the first one appeared
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Settle {
    /// Sleep for a fixed delay
    Fixed { delay_ms: u64 },
    /// Poll the child count until two consecutive polls agree, at most `max_wait_ms`
    Stable { interval_ms: u64, max_wait_ms: u64 },
}

impl Default for Settle {
    fn default() -> Self {
        Settle::Fixed { delay_ms: 5_000 }
    }
}

/// Wait for the first element matching `selector`, let the list settle,
/// then return every match in document order
pub async fn wait_then_settle<P: PageQuery>(
    page: &P,
    selector: &str,
    timeout: Duration,
    settle: &Settle,
) -> Result<Vec<P::Element>> {
    page.wait_for_first(selector, timeout).await?;

    match settle {
        Settle::Fixed { delay_ms } => {
            sleep(Duration::from_millis(*delay_ms)).await;
            page.find_all(selector).await
        }
        Settle::Stable {
            interval_ms,
            max_wait_ms,
        } => {
            let deadline = Instant::now() + Duration::from_millis(*max_wait_ms);
            let interval = Duration::from_millis(*interval_ms);
            let mut elements = page.find_all(selector).await?;
            loop {
                if Instant::now() >= deadline {
                    ::log::debug!(
                        "List for {} still changing after {}ms, using {} elements",
                        selector,
                        max_wait_ms,
                        elements.len()
                    );
                    return Ok(elements);
                }
                sleep(interval).await;
                let next = page.find_all(selector).await?;
                if next.len() == elements.len() {
                    return Ok(next);
                }
                elements = next;
            }
        }
    }
}

/// Wait for `selector` but treat a timeout as "not present"
pub async fn probe<P: PageQuery>(
    page: &P,
    selector: &str,
    timeout: Duration,
) -> Result<Option<P::Element>> {
    match page.wait_for_first(selector, timeout).await {
        Ok(element) => Ok(Some(element)),
        Err(Error::ElementNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Click an optional control; absence or failure is ignored
pub async fn click_optional<P: PageInteraction>(page: &P, selector: &str, timeout: Duration) {
    let element = match page.wait_for_first(selector, timeout).await {
        Ok(element) => element,
        Err(e) => {
            ::log::debug!("Optional control {} not available: {}", selector, e);
            return;
        }
    };
    if let Err(e) = page.click(&element).await {
        ::log::debug!("Ignoring failed click on {}: {}", selector, e);
    }
}
