//! Retry decisions and backoff timing.
//!
//! Two generations of generated code share this module. The typed surface
//! ([`RetryOptions`], [`RetryCondition`], [`BackoffPolicy`]) matches
//! conditions against the error taxonomy and computes jittered backoff;
//! [`should_retry`] and [`backoff_delay`] drive it from a per-attempt
//! [`RetryPolicyContext`]. The legacy surface ([`allow_retry`],
//! [`backoff_time`]) interprets the loosely-typed runtime maps older
//! generators emit.
//!
//! # Examples
//!
//! ```
//! use keelson::error::Error;
//! use keelson::retry::{self, BackoffPolicy, RetryCondition, RetryOptions, RetryPolicyContext};
//! use keelson::ResponseError;
//!
//! let options = RetryOptions {
//!     retryable: true,
//!     retry_condition: vec![RetryCondition {
//!         max_attempts: 3,
//!         backoff: Some(BackoffPolicy::Fixed { period: 1000 }),
//!         exception: vec!["ThrottlingError".to_string()],
//!         ..Default::default()
//!     }],
//!     ..Default::default()
//! };
//!
//! let err = ResponseError {
//!     kind: Some("ThrottlingError".to_string()),
//!     ..Default::default()
//! };
//! let ctx = RetryPolicyContext::new(1).with_exception(Error::from(err));
//!
//! assert!(retry::should_retry(Some(&options), &ctx));
//! assert_eq!(retry::backoff_delay(&options, &ctx), 1000);
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentMap};
use crate::error::Error;
use crate::http::{Request, Response};

/// Ceiling for any computed backoff delay, in milliseconds.
pub const MAX_DELAY_TIME: u64 = 120_000;

/// Delay used when a matching condition declares no backoff, in milliseconds.
pub const MIN_DELAY_TIME: u64 = 100;

const RANDOM_CAP: u64 = 20_000;
const EXPONENTIAL_CAP: u64 = 259_200_000;

fn default_random_cap() -> u64 {
    RANDOM_CAP
}

fn default_exponential_cap() -> u64 {
    EXPONENTIAL_CAP
}

/// A backoff curve, selected by the `policy` tag in serialized form.
///
/// The jittered variants accept their long policy names
/// (`ExponentialWithEqualJitter`, `ExponentialWithFullJitter`) as aliases
/// when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy")]
pub enum BackoffPolicy {
    /// The same `period` milliseconds after every attempt.
    Fixed {
        /// Delay in milliseconds.
        period: u64,
    },
    /// Uniformly random in `[0, attempts * period)`, capped.
    Random {
        /// Scale in milliseconds per attempt.
        period: u64,
        /// Ceiling in milliseconds.
        #[serde(default = "default_random_cap")]
        cap: u64,
    },
    /// `2 ^ (attempts * period)` milliseconds, capped.
    Exponential {
        /// Exponent scale per attempt.
        period: u64,
        /// Ceiling in milliseconds.
        #[serde(default = "default_exponential_cap")]
        cap: u64,
    },
    /// Exponential ceiling with the upper half jittered.
    #[serde(alias = "ExponentialWithEqualJitter")]
    EqualJitter {
        /// Exponent scale per attempt.
        period: u64,
        /// Ceiling in milliseconds.
        #[serde(default = "default_exponential_cap")]
        cap: u64,
    },
    /// Uniformly random under the exponential ceiling.
    #[serde(alias = "ExponentialWithFullJitter")]
    FullJitter {
        /// Exponent scale per attempt.
        period: u64,
        /// Ceiling in milliseconds.
        #[serde(default = "default_exponential_cap")]
        cap: u64,
    },
}

impl BackoffPolicy {
    /// Computes the delay in milliseconds after `retries_attempted` tries.
    pub fn delay_for_attempt(&self, retries_attempted: u64) -> u64 {
        let attempts = retries_attempted as f64;
        match self {
            BackoffPolicy::Fixed { period } => *period,
            BackoffPolicy::Random { period, cap } => {
                let delay = random_less_than(attempts * *period as f64);
                delay.min(*cap)
            }
            BackoffPolicy::Exponential { period, cap } => {
                let delay = 2f64.powf(attempts * *period as f64);
                if delay > *cap as f64 {
                    *cap
                } else {
                    delay as u64
                }
            }
            BackoffPolicy::EqualJitter { period, cap } => {
                let ceil = (*cap as f64).min(2f64.powf(attempts * *period as f64));
                let half = ceil / 2.0;
                (half as u64) + random_less_than(half + 1.0)
            }
            BackoffPolicy::FullJitter { period, cap } => {
                let ceil = (*cap as f64).min(2f64.powf(attempts * *period as f64));
                random_less_than(ceil)
            }
        }
    }
}

fn random_less_than(bound: f64) -> u64 {
    if bound <= 0.0 {
        return 0;
    }
    (rand::thread_rng().gen_range(0.0..1.0) * bound).floor() as u64
}

/// One matchable retry rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryCondition {
    /// Attempts allowed once this condition matches.
    pub max_attempts: u64,
    /// Backoff curve; absent means the minimum delay.
    pub backoff: Option<BackoffPolicy>,
    /// Error taxonomy names this condition matches.
    pub exception: Vec<String>,
    /// Error codes this condition matches.
    pub error_code: Vec<String>,
    /// Per-condition delay ceiling in milliseconds.
    pub max_delay: Option<u64>,
}

/// The retry policy a generated client carries in its runtime options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryOptions {
    /// Master switch; `false` disables every condition.
    pub retryable: bool,
    /// Conditions that permit a retry.
    pub retry_condition: Vec<RetryCondition>,
    /// Conditions that veto a retry, checked first.
    pub no_retry_condition: Vec<RetryCondition>,
}

/// Everything known about the attempt that just failed.
#[derive(Debug, Default)]
pub struct RetryPolicyContext {
    /// Retries already performed; `0` means the first call has not run.
    pub retries_attempted: u64,
    /// The request of the failed attempt.
    pub http_request: Option<Request>,
    /// The response of the failed attempt, when the server answered.
    pub http_response: Option<Response>,
    /// The error that ended the attempt.
    pub exception: Option<Error>,
}

impl RetryPolicyContext {
    /// Creates a context for the given attempt count.
    pub fn new(retries_attempted: u64) -> Self {
        RetryPolicyContext {
            retries_attempted,
            ..Default::default()
        }
    }

    /// Attaches the error that ended the attempt.
    pub fn with_exception(mut self, exception: Error) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Attaches the request of the failed attempt.
    pub fn with_request(mut self, request: Request) -> Self {
        self.http_request = Some(request);
        self
    }

    /// Attaches the response of the failed attempt.
    pub fn with_response(mut self, response: Response) -> Self {
        self.http_response = Some(response);
        self
    }
}

fn condition_matches(condition: &RetryCondition, error: Option<&Error>) -> bool {
    let Some(error) = error else {
        return false;
    };
    if condition.exception.iter().any(|name| name == error.kind()) {
        return true;
    }
    error
        .code()
        .is_some_and(|code| condition.error_code.iter().any(|candidate| candidate == code))
}

/// Decides whether another attempt should run.
///
/// The first call is always allowed; after that the decision is
/// [`should_retry_strict`].
pub fn should_retry(options: Option<&RetryOptions>, ctx: &RetryPolicyContext) -> bool {
    if ctx.retries_attempted == 0 {
        return true;
    }
    should_retry_strict(options, ctx)
}

/// Decides whether another attempt should run, with no first-call grace.
///
/// Veto conditions are checked before permitting ones, and the first
/// permitting condition that matches settles the decision against its
/// own attempt budget.
pub fn should_retry_strict(options: Option<&RetryOptions>, ctx: &RetryPolicyContext) -> bool {
    let Some(options) = options else {
        return false;
    };
    if !options.retryable {
        return false;
    }

    let error = ctx.exception.as_ref();
    for condition in &options.no_retry_condition {
        if condition_matches(condition, error) {
            return false;
        }
    }
    for condition in &options.retry_condition {
        if condition_matches(condition, error) {
            if ctx.retries_attempted >= condition.max_attempts {
                tracing::warn!(
                    retries_attempted = ctx.retries_attempted,
                    max_attempts = condition.max_attempts,
                    "retry budget exhausted"
                );
                return false;
            }
            return true;
        }
    }
    false
}

/// Computes the delay in milliseconds before the next attempt.
///
/// The first matching condition decides: a server-sent retry-after wins
/// (clamped to the condition's ceiling), then the condition's backoff
/// curve, then [`MIN_DELAY_TIME`]. No match also means the minimum.
pub fn backoff_delay(options: &RetryOptions, ctx: &RetryPolicyContext) -> u64 {
    let error = ctx.exception.as_ref();
    for condition in &options.retry_condition {
        if !condition_matches(condition, error) {
            continue;
        }
        let max_delay = condition
            .max_delay
            .filter(|delay| *delay > 0)
            .unwrap_or(MAX_DELAY_TIME);
        if let Some(retry_after) = error.and_then(Error::retry_after) {
            return retry_after.min(max_delay);
        }
        let Some(backoff) = &condition.backoff else {
            return MIN_DELAY_TIME;
        };
        return backoff.delay_for_attempt(ctx.retries_attempted).min(max_delay);
    }
    MIN_DELAY_TIME
}

/// Decides a retry for the loosely-typed runtime maps older generators emit.
///
/// The map carries `retryable`, an optional `policy` of `never`, `always`,
/// `simple` (bounded by `maxAttempts`), or `timeout` (bounded by `timeout`
/// milliseconds since `started_at`), and a bare `maxAttempts` fallback.
pub fn allow_retry(
    retry: Option<&DocumentMap>,
    retries_attempted: u64,
    started_at: Instant,
) -> bool {
    if retries_attempted == 0 {
        return true;
    }
    let Some(retry) = retry else {
        return false;
    };
    if retry.get("retryable") != Some(&Document::Bool(true)) {
        return false;
    }

    match get_str(retry, "policy") {
        Some("never") => return false,
        Some("always") => return true,
        Some("simple") => {
            return get_f64(retry, "maxAttempts")
                .map(|max| (retries_attempted as f64) < max)
                .unwrap_or(false);
        }
        Some("timeout") => {
            return get_f64(retry, "timeout")
                .map(|timeout| (started_at.elapsed().as_millis() as f64) < timeout)
                .unwrap_or(false);
        }
        _ => {}
    }

    match get_f64(retry, "maxAttempts") {
        Some(max) if max != 0.0 => max >= retries_attempted as f64,
        _ => false,
    }
}

/// Computes the legacy backoff in milliseconds from a backoff map.
///
/// Policies are `no`, `fixed` (`period`), `random` (`minPeriod` to
/// `maxPeriod`), `exponential`, and `exponential_random` (`initial`,
/// `multiplier`, `max`). The first call and unknown policies get no delay.
pub fn backoff_time(backoff: Option<&DocumentMap>, retries_attempted: u64) -> u64 {
    if retries_attempted == 0 {
        return 0;
    }
    let Some(backoff) = backoff else {
        return 0;
    };

    match get_str(backoff, "policy") {
        Some("no") => 0,
        Some("fixed") => get_f64(backoff, "period").unwrap_or(0.0) as u64,
        Some("random") => {
            let min = get_f64(backoff, "minPeriod").unwrap_or(0.0);
            let max = get_f64(backoff, "maxPeriod").unwrap_or(0.0);
            if max <= min {
                return min.max(0.0) as u64;
            }
            (min + (max - min) * rand::thread_rng().gen_range(0.0..1.0)) as u64
        }
        Some("exponential") => exponential_backoff(backoff, retries_attempted, 1.0),
        Some("exponential_random") => {
            let scale = rand::thread_rng().gen_range(0.5..1.5);
            exponential_backoff(backoff, retries_attempted, scale)
        }
        _ => 0,
    }
}

fn exponential_backoff(backoff: &DocumentMap, retries_attempted: u64, scale: f64) -> u64 {
    let initial = get_f64(backoff, "initial").unwrap_or(0.0);
    let multiplier = get_f64(backoff, "multiplier").unwrap_or(0.0);
    let max = get_f64(backoff, "max").unwrap_or(f64::MAX);
    let time = initial * (1.0 + multiplier).powi(retries_attempted as i32 - 1);
    (time * scale).min(max) as u64
}

fn get_str<'m>(map: &'m DocumentMap, key: &str) -> Option<&'m str> {
    map.get(key).and_then(Document::as_str)
}

fn get_f64(map: &DocumentMap, key: &str) -> Option<f64> {
    match map.get(key) {
        Some(Document::Integer(number)) => Some(*number as f64),
        Some(Document::Float(number)) => Some(*number),
        _ => None,
    }
}

/// Sleeps for the given number of milliseconds.
pub async fn sleep(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResponseError;

    fn throttling_error(retry_after: Option<u64>) -> Error {
        Error::from(ResponseError {
            kind: Some("ThrottlingError".to_string()),
            code: Some("Throttling".to_string()),
            message: "slow down".to_string(),
            retry_after,
            ..Default::default()
        })
    }

    fn throttling_options(backoff: Option<BackoffPolicy>, max_delay: Option<u64>) -> RetryOptions {
        RetryOptions {
            retryable: true,
            retry_condition: vec![RetryCondition {
                max_attempts: 3,
                backoff,
                exception: vec!["ThrottlingError".to_string()],
                max_delay,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn first_attempt_is_always_allowed() {
        let ctx = RetryPolicyContext::new(0);
        assert!(should_retry(None, &ctx));
        assert!(!should_retry_strict(None, &ctx));
    }

    #[test]
    fn no_options_means_no_retry() {
        let ctx = RetryPolicyContext::new(1).with_exception(throttling_error(None));
        assert!(!should_retry(None, &ctx));
    }

    #[test]
    fn retryable_switch_disables_everything() {
        let mut options = throttling_options(None, None);
        options.retryable = false;
        let ctx = RetryPolicyContext::new(1).with_exception(throttling_error(None));
        assert!(!should_retry(Some(&options), &ctx));
    }

    #[test]
    fn budget_bounds_matching_conditions() {
        let options = throttling_options(None, None);
        let allowed = RetryPolicyContext::new(2).with_exception(throttling_error(None));
        assert!(should_retry(Some(&options), &allowed));

        let spent = RetryPolicyContext::new(3).with_exception(throttling_error(None));
        assert!(!should_retry(Some(&options), &spent));
    }

    #[test]
    fn veto_conditions_win() {
        let mut options = throttling_options(None, None);
        options.no_retry_condition = vec![RetryCondition {
            error_code: vec!["Throttling".to_string()],
            ..Default::default()
        }];
        let ctx = RetryPolicyContext::new(1).with_exception(throttling_error(None));
        assert!(!should_retry(Some(&options), &ctx));
    }

    #[test]
    fn unmatched_errors_do_not_retry() {
        let options = throttling_options(None, None);
        let ctx = RetryPolicyContext::new(1).with_exception(Error::CannotCast);
        assert!(!should_retry(Some(&options), &ctx));

        let no_error = RetryPolicyContext::new(1);
        assert!(!should_retry(Some(&options), &no_error));
    }

    #[test]
    fn error_codes_match_too() {
        let mut options = throttling_options(None, None);
        options.retry_condition[0].exception.clear();
        options.retry_condition[0].error_code = vec!["Throttling".to_string()];
        let ctx = RetryPolicyContext::new(1).with_exception(throttling_error(None));
        assert!(should_retry(Some(&options), &ctx));
    }

    #[test]
    fn fixed_backoff_ignores_the_attempt() {
        let policy = BackoffPolicy::Fixed { period: 1000 };
        assert_eq!(policy.delay_for_attempt(1), 1000);
        assert_eq!(policy.delay_for_attempt(7), 1000);
    }

    #[test]
    fn exponential_backoff_caps() {
        let policy = BackoffPolicy::Exponential { period: 5, cap: 10_000 };
        assert_eq!(policy.delay_for_attempt(2), 1024);

        let policy = BackoffPolicy::Exponential { period: 10, cap: 10_000 };
        assert_eq!(policy.delay_for_attempt(2), 10_000);
    }

    #[test]
    fn equal_jitter_stays_in_the_upper_half() {
        let policy = BackoffPolicy::EqualJitter { period: 5, cap: 10_000 };
        for _ in 0..64 {
            let delay = policy.delay_for_attempt(2);
            assert!((512..=1024).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn full_jitter_stays_under_the_ceiling() {
        let policy = BackoffPolicy::FullJitter { period: 5, cap: 10_000 };
        for _ in 0..64 {
            assert!(policy.delay_for_attempt(2) < 1024);
        }
    }

    #[test]
    fn random_backoff_respects_its_cap() {
        let policy = BackoffPolicy::Random { period: 1000, cap: 20_000 };
        for _ in 0..64 {
            assert!(policy.delay_for_attempt(2) < 2000);
        }

        let policy = BackoffPolicy::Random { period: 1_000_000, cap: 100 };
        for _ in 0..64 {
            assert!(policy.delay_for_attempt(2) <= 100);
        }
    }

    #[test]
    fn retry_after_wins_within_the_ceiling() {
        let options = throttling_options(Some(BackoffPolicy::Fixed { period: 1000 }), Some(5000));
        let ctx = RetryPolicyContext::new(1).with_exception(throttling_error(Some(3000)));
        assert_eq!(backoff_delay(&options, &ctx), 3000);

        let options = throttling_options(Some(BackoffPolicy::Fixed { period: 1000 }), Some(1000));
        let ctx = RetryPolicyContext::new(1).with_exception(throttling_error(Some(6000)));
        assert_eq!(backoff_delay(&options, &ctx), 1000);
    }

    #[test]
    fn missing_backoff_and_missing_match_use_the_minimum() {
        let options = throttling_options(None, None);
        let ctx = RetryPolicyContext::new(1).with_exception(throttling_error(None));
        assert_eq!(backoff_delay(&options, &ctx), MIN_DELAY_TIME);

        let ctx = RetryPolicyContext::new(1).with_exception(Error::CannotCast);
        assert_eq!(backoff_delay(&options, &ctx), MIN_DELAY_TIME);
    }

    #[test]
    fn backoff_is_clamped_by_max_delay() {
        let options = throttling_options(Some(BackoffPolicy::Fixed { period: 9000 }), Some(2000));
        let ctx = RetryPolicyContext::new(1).with_exception(throttling_error(None));
        assert_eq!(backoff_delay(&options, &ctx), 2000);
    }

    #[test]
    fn options_deserialize_from_wire_shape() {
        let options: RetryOptions = serde_json::from_str(
            r#"{
                "retryable": true,
                "retryCondition": [{
                    "maxAttempts": 3,
                    "backoff": {"policy": "ExponentialWithEqualJitter", "period": 5},
                    "exception": ["ThrottlingError"],
                    "errorCode": ["Throttling"],
                    "maxDelay": 5000
                }]
            }"#,
        )
        .unwrap();

        assert!(options.retryable);
        let condition = &options.retry_condition[0];
        assert_eq!(condition.max_attempts, 3);
        assert_eq!(condition.max_delay, Some(5000));
        assert_eq!(
            condition.backoff,
            Some(BackoffPolicy::EqualJitter { period: 5, cap: EXPONENTIAL_CAP }),
        );
    }

    fn legacy(value: serde_json::Value) -> DocumentMap {
        match Document::from_json(value) {
            Document::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn legacy_first_attempt_is_allowed() {
        assert!(allow_retry(None, 0, Instant::now()));
        assert!(!allow_retry(None, 1, Instant::now()));
    }

    #[test]
    fn legacy_requires_the_retryable_flag() {
        let retry = legacy(serde_json::json!({"policy": "always"}));
        assert!(!allow_retry(Some(&retry), 1, Instant::now()));
    }

    #[test]
    fn legacy_policies() {
        let never = legacy(serde_json::json!({"retryable": true, "policy": "never"}));
        assert!(!allow_retry(Some(&never), 1, Instant::now()));

        let always = legacy(serde_json::json!({"retryable": true, "policy": "always"}));
        assert!(allow_retry(Some(&always), 9, Instant::now()));

        let simple = legacy(serde_json::json!({
            "retryable": true, "policy": "simple", "maxAttempts": 3,
        }));
        assert!(allow_retry(Some(&simple), 2, Instant::now()));
        assert!(!allow_retry(Some(&simple), 3, Instant::now()));

        let timeout = legacy(serde_json::json!({
            "retryable": true, "policy": "timeout", "timeout": 10_000,
        }));
        assert!(allow_retry(Some(&timeout), 1, Instant::now()));
    }

    #[test]
    fn legacy_bare_max_attempts_is_inclusive() {
        let retry = legacy(serde_json::json!({"retryable": true, "maxAttempts": 3}));
        assert!(allow_retry(Some(&retry), 3, Instant::now()));
        assert!(!allow_retry(Some(&retry), 4, Instant::now()));
    }

    #[test]
    fn legacy_backoff_times() {
        assert_eq!(backoff_time(None, 1), 0);

        let fixed = legacy(serde_json::json!({"policy": "fixed", "period": 250}));
        assert_eq!(backoff_time(Some(&fixed), 0), 0);
        assert_eq!(backoff_time(Some(&fixed), 2), 250);

        let none = legacy(serde_json::json!({"policy": "no"}));
        assert_eq!(backoff_time(Some(&none), 2), 0);

        let random = legacy(serde_json::json!({
            "policy": "random", "minPeriod": 100, "maxPeriod": 200,
        }));
        for _ in 0..64 {
            let delay = backoff_time(Some(&random), 2);
            assert!((100..200).contains(&delay), "delay {delay} out of range");
        }

        let exponential = legacy(serde_json::json!({
            "policy": "exponential", "initial": 100, "multiplier": 1, "max": 10_000,
        }));
        assert_eq!(backoff_time(Some(&exponential), 3), 400);
        assert_eq!(backoff_time(Some(&exponential), 10), 10_000);

        let jittered = legacy(serde_json::json!({
            "policy": "exponential_random", "initial": 100, "multiplier": 1, "max": 10_000,
        }));
        for _ in 0..64 {
            let delay = backoff_time(Some(&jittered), 2);
            assert!((100..300).contains(&delay), "delay {delay} out of range");
        }
    }
}
