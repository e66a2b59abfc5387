//! Property-based tests for retry backoff.
//!
//! Uses proptest to validate:
//! - Delays never exceed the configured maximum
//! - Delays never shrink as failures accumulate
//! - Requeue delays named by an action are honoured exactly

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::time::Duration;

use converge_composed::{Error as PipelineError, Signal};
use converge_reconciler::{handle_signal, BackoffConfig, ReconcileOutcome, ReconcilerConfig};
use proptest::prelude::*;

fn backoff_strategy() -> impl Strategy<Value = BackoffConfig> {
    (1u64..10_000, 0u64..1_000_000, 1.1f64..4.0).prop_map(|(initial_ms, extra, multiplier)| {
        BackoffConfig {
            initial_ms,
            max_ms: initial_ms.saturating_add(extra),
            multiplier,
        }
    })
}

proptest! {
    /// Property: backoff is bounded by max and never below the initial delay
    #[test]
    fn prop_backoff_bounded(backoff in backoff_strategy(), failures in 0u32..200) {
        let delay = backoff.delay_for(failures);
        prop_assert!(delay <= backoff.max());
        prop_assert!(delay >= backoff.initial());
    }

    /// Property: more consecutive failures never shorten the delay
    #[test]
    fn prop_backoff_monotonic(backoff in backoff_strategy(), failures in 1u32..200) {
        let shorter = backoff.delay_for(failures);
        let longer = backoff.delay_for(failures.saturating_add(1));
        prop_assert!(longer >= shorter);
    }

    /// Property: an explicit requeue delay passes through unchanged
    #[test]
    fn prop_explicit_requeue_honoured(millis in 0u64..86_400_000, failures in 0u32..10) {
        let after = Duration::from_millis(millis);
        let outcome = handle_signal(Signal::requeue_after(after), &ReconcilerConfig::default(), failures);
        prop_assert_eq!(outcome, ReconcileOutcome::Requeue { after });
    }

    /// Property: a propagated error is never lost
    #[test]
    fn prop_propagated_error_kept(reason in "[a-z ]{1,40}", failures in 1u32..50) {
        let err = PipelineError::step_failed("allocate", reason);
        let outcome = handle_signal(Signal::Propagate(err.clone()), &ReconcilerConfig::default(), failures);
        prop_assert_eq!(outcome.error(), Some(&err));
    }
}
