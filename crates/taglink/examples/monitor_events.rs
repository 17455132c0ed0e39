//! Monitor real-time reader events.
//!
//! Demonstrates continuous-scan mode: subscribing to the reader event
//! stream and printing tag inventory rounds, GPIO input changes, and
//! connection status transitions as they arrive. This is the shape of an
//! access-control or conveyor-tracking service.
//!
//! # Requirements
//!
//! - A TL-P400 (or other TL-series reader) reachable over the network
//! - The endpoint adjusted for your installation
//!
//! # Usage
//!
//! ```sh
//! cargo run -p taglink --features uhf --example monitor_events
//! ```

use std::time::Duration;

use taglink::uhf::models::tl_p400;
use taglink::uhf::UhfReaderBuilder;
use taglink::{Reader, ReaderEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("taglink=info")),
        )
        .init();

    // A bare host gets the model's default port (2101) appended.
    let endpoint = "10.0.0.5";

    println!("Connecting to TL-P400 at {}...", endpoint);

    let reader = UhfReaderBuilder::new(tl_p400())
        .tcp_endpoint(endpoint)
        .build()?;
    reader.connect().await?;

    let identity = reader.identity().await?;
    println!("Connected: {}\n", identity);

    // Subscribe before starting the scan so no round is missed.
    let mut events = reader.subscribe();
    reader.start_inventory().await?;
    println!("Continuous scan started. Monitoring for 60 seconds...");
    println!("(Move tags through the field or toggle an input to generate events)\n");

    println!("{:<12} Event", "Timestamp");
    println!("{:-<12} {:-<50}", "", "");

    let start = tokio::time::Instant::now();
    let deadline = start + Duration::from_secs(60);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) => {
                let elapsed = start.elapsed();
                let timestamp = format!("{:>6}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());

                match event {
                    ReaderEvent::TagInventory { frames, .. } => {
                        println!("{} TagInventory      {} tag(s)", timestamp, frames.len());
                        for frame in &frames {
                            println!("{:<12}   {}", "", frame);
                        }
                    }
                    ReaderEvent::InputChanged { pin, level } => {
                        let state = if level { "HI" } else { "LO" };
                        println!("{} InputChanged      pin {} -> {}", timestamp, pin, state);
                    }
                    ReaderEvent::ConnectionStatus { state, message } => {
                        println!("{} ConnectionStatus  {} ({})", timestamp, state, message);
                    }
                }
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(n))) => {
                println!("(fell behind, {} events dropped)", n);
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                println!("Event channel closed.");
                break;
            }
            Err(_) => {
                // Monitoring window elapsed.
                break;
            }
        }
    }

    println!("\nStopping scan...");
    reader.stop_inventory().await?;
    reader.disconnect().await?;
    println!("Done.");
    Ok(())
}
