//! Create a few named processors, push work at them, then ping one and
//! print the registry report table.
//!
//! Run with: cargo run --example report

use serialq::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> SerialqResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let registry = Registry::new();

    let mailer = registry
        .get_or_create("outbound-email", CreatePolicy::CreateIfAbsent)
        .await?
        .expect("created on first use");
    let indexer = registry
        .get_or_create("search-index", CreatePolicy::CreateIfAbsent)
        .await?
        .expect("created on first use");

    for i in 0..10u32 {
        mailer.push(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tracing::info!("sent email batch {}", i);
            Ok(())
        })?;
    }
    indexer.push(async {
        tracing::info!("rebuilt search index");
        Ok(())
    })?;

    let latency = serialq::ping(&registry, "outbound-email").await?;
    println!("outbound-email ping time: {:?}", latency);

    let report = serialq::report(&registry).await;
    println!("{}", report);

    mailer.release().await;
    indexer.release().await;
    Ok(())
}
