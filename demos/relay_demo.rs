//! In-process relay demo
//!
//! Run with: cargo run --example relay_demo
//!
//! Starts a few long-polling listeners, publishes messages from the main
//! task, and shows which listener received what. The runtime has a single
//! thread, so no listener runs between the two publishes: every single-slot
//! mailbox still holds the first message and the second one is dropped.

use std::sync::Arc;
use std::time::Duration;

use pctochat::Broadcaster;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pctochat=debug")),
        )
        .init();

    let relay = Arc::new(Broadcaster::new());

    let listeners: Vec<_> = ["ann", "ben", "cat"]
        .into_iter()
        .map(|name| {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move {
                for _ in 0..2 {
                    let handle = relay.subscribe();
                    match relay.wait(handle, Duration::from_secs(1)).await {
                        Some(msg) => {
                            println!("[{}] got {:?}", name, String::from_utf8_lossy(msg.payload()))
                        }
                        None => println!("[{}] nothing within a second", name),
                    }
                }
            })
        })
        .collect();

    // Let every listener register
    while relay.registry().len() < 3 {
        tokio::task::yield_now().await;
    }

    // No await between these, so no listener can empty its mailbox
    relay.announce_join("dan");
    relay.publish("missed by everyone");

    for listener in listeners {
        let _ = listener.await;
    }

    let stats = relay.stats();
    println!(
        "published={} delivered={} missed={}",
        stats.messages_published, stats.deliveries, stats.missed_deliveries
    );
}
