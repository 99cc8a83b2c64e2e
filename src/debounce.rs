//! Supersede-on-new-input lookups
//!
//! Each trigger takes a generation number. A lookup only starts once the
//! delay has passed without a newer trigger, and its result is dropped if a
//! newer trigger arrived while it was in flight. Superseded work is never
//! cancelled, only ignored.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::resolver::Resolver;

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Invalidate every pending and in-flight lookup
    pub fn supersede(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Wait out the delay and run `lookup` unless superseded.
    /// `None` means a newer trigger won.
    pub async fn run<F, Fut, T>(&self, lookup: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.delay).await;
        if !self.is_current(generation) {
            return None;
        }

        let result = lookup().await;
        if !self.is_current(generation) {
            log::debug!("Discarding superseded lookup result (generation {})", generation);
            return None;
        }
        Some(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum RecipientStatus {
    /// Nothing entered
    Idle,
    Valid(String),
    Invalid(String),
}

/// Search-as-you-type recipient validation
pub struct RecipientValidator {
    resolver: Resolver,
    debouncer: Debouncer,
}

impl RecipientValidator {
    pub fn new(resolver: Resolver, delay: Duration) -> Self {
        Self {
            resolver,
            debouncer: Debouncer::new(delay),
        }
    }

    /// Validate `input` for a sender at `own_address`; `None` when a newer
    /// input superseded this one
    pub async fn validate(&self, input: &str, own_address: Option<&str>) -> Option<RecipientStatus> {
        if input.trim().is_empty() {
            self.debouncer.supersede();
            return Some(RecipientStatus::Idle);
        }

        self.debouncer
            .run(|| async {
                match self.resolver.resolve(input).await {
                    Ok(address) if Some(address.as_str()) == own_address => {
                        RecipientStatus::Invalid("Cannot send to your own address".to_string())
                    }
                    Ok(address) => RecipientStatus::Valid(address),
                    Err(e) => RecipientStatus::Invalid(e.to_string()),
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_single_trigger_runs() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        assert_eq!(debouncer.run(|| async { 42 }).await, Some(42));
    }

    #[tokio::test]
    async fn test_newer_trigger_supersedes_pending_one() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(50)));

        let first = {
            let debouncer = debouncer.clone();
            tokio::spawn(async move { debouncer.run(|| async { "al" }).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = debouncer.run(|| async { "alice" }).await;

        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second, Some("alice"));
    }

    #[tokio::test]
    async fn test_in_flight_result_is_discarded() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(5)));

        let slow = {
            let debouncer = debouncer.clone();
            tokio::spawn(async move {
                debouncer
                    .run(|| async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        "stale"
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        let fresh = debouncer.run(|| async { "fresh" }).await;

        assert_eq!(fresh, Some("fresh"));
        assert_eq!(slow.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_input_is_idle_without_lookup() {
        let resolver = Resolver::new(
            crate::api::StacksApiClient::new("http://127.0.0.1:9"),
            "ST2Y455NJPETB2SRSD0VDZP3KJE50WNHY0BN3TWY5.username-registry"
                .parse()
                .unwrap(),
        );
        let validator = RecipientValidator::new(resolver, Duration::from_millis(5));

        assert_eq!(validator.validate("   ", None).await, Some(RecipientStatus::Idle));

        let own = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQYAC0RQ";
        assert!(matches!(
            validator.validate(own, Some(own)).await,
            Some(RecipientStatus::Invalid(_))
        ));
        assert_eq!(
            validator.validate("ST000000000000000000002AMW42H", Some(own)).await,
            Some(RecipientStatus::Valid("ST000000000000000000002AMW42H".to_string()))
        );
    }
}
