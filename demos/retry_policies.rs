//! Example demonstrating retry policies and backoff curves.
//!
//! This example shows how to:
//! - Compare the delay curves of the built-in backoff policies
//! - Load a retry policy from its JSON configuration shape
//! - Drive a retry loop with `should_retry`, `backoff_delay` and `sleep`
//! - Let a server-sent retry-after override the configured curve
//!
//! Run with: `cargo run --example retry_policies`

use std::time::Instant;

use keelson::error::{Error, ResponseError};
use keelson::retry::{self, BackoffPolicy, RetryOptions, RetryPolicyContext};

fn throttled(retry_after: Option<u64>) -> Error {
    Error::from(ResponseError {
        kind: Some("ThrottlingError".to_string()),
        code: Some("Throttling.User".to_string()),
        message: "request rate too high".to_string(),
        retry_after,
        ..Default::default()
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("keelson=info,retry_policies=info")
        .init();

    println!("=== Backoff Curves ===");
    let curves = [
        ("Fixed", BackoffPolicy::Fixed { period: 100 }),
        (
            "Random",
            BackoffPolicy::Random {
                period: 100,
                cap: 20_000,
            },
        ),
        (
            "Exponential",
            BackoffPolicy::Exponential {
                period: 2,
                cap: 60_000,
            },
        ),
        (
            "EqualJitter",
            BackoffPolicy::EqualJitter {
                period: 2,
                cap: 60_000,
            },
        ),
        (
            "FullJitter",
            BackoffPolicy::FullJitter {
                period: 2,
                cap: 60_000,
            },
        ),
    ];
    println!("delays in milliseconds after retries 1 through 5:");
    for (name, policy) in &curves {
        let delays: Vec<u64> = (1..=5)
            .map(|retries| policy.delay_for_attempt(retries))
            .collect();
        println!("{name:<12} {delays:?}");
    }

    println!("\n=== A Policy From Configuration ===");
    let options: RetryOptions = serde_json::from_value(serde_json::json!({
        "retryable": true,
        "retryCondition": [{
            "maxAttempts": 3,
            "backoff": { "policy": "ExponentialWithEqualJitter", "period": 2 },
            "exception": ["ThrottlingError"],
            "maxDelay": 5_000,
        }],
    }))?;
    println!("parsed: {options:?}");

    println!("\n=== Driving a Retry Loop ===");
    let started = Instant::now();
    let mut retries = 0;
    loop {
        // every simulated call fails with the same throttling error
        let context = RetryPolicyContext::new(retries).with_exception(throttled(None));
        if !retry::should_retry(Some(&options), &context) {
            println!("budget exhausted after {retries} retries");
            break;
        }
        let delay = retry::backoff_delay(&options, &context);
        println!("attempt {} failed; backing off {delay} ms", retries + 1);
        retry::sleep(delay).await;
        retries += 1;
    }
    println!("total wait: {:?}", started.elapsed());

    println!("\n=== Server-Sent Retry-After ===");
    let context = RetryPolicyContext::new(1).with_exception(throttled(Some(1_800)));
    let delay = retry::backoff_delay(&options, &context);
    println!("server asked for 1800 ms; policy grants {delay} ms");

    let context = RetryPolicyContext::new(1).with_exception(throttled(Some(90_000)));
    let delay = retry::backoff_delay(&options, &context);
    println!("server asked for 90000 ms; the 5000 ms ceiling grants {delay} ms");

    Ok(())
}
