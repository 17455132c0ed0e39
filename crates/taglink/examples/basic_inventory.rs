//! Basic UHF reader control example.
//!
//! Demonstrates connecting to a TL-D100 desktop reader over USB serial,
//! reading its identity, configuring RF power, and running a single
//! inventory round.
//!
//! # Requirements
//!
//! - A TL-D100 (or other TL-series reader) connected via USB
//! - The serial port path adjusted for your system (e.g., `/dev/ttyUSB0`
//!   on Linux, `COM3` on Windows)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p taglink --features uhf --example basic_inventory
//! ```

use taglink::uhf::models::tl_d100;
use taglink::uhf::UhfReaderBuilder;
use taglink::Reader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=taglink_ascii=trace shows every frame on the wire.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("taglink=debug")),
        )
        .init();

    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting to TL-D100 on {}...", serial_port);

    let reader = UhfReaderBuilder::new(tl_d100())
        .serial_port(serial_port)
        .build()?;
    reader.connect().await?;

    // Print reader identity and model capabilities.
    let identity = reader.identity().await?;
    println!("Connected: {}", identity);

    let model = reader.model();
    println!("Model: {}", model.name);
    println!("Antenna ports: {}", model.antenna_count);
    println!(
        "Power range: {}-{} dBm",
        model.power_range_dbm.start(),
        model.power_range_dbm.end()
    );

    // Set RF output power to 10 dBm.
    println!("\nSetting power to 10 dBm...");
    reader.set_power(10).await?;

    // Run a single inventory round.
    println!("Running inventory...");
    let frames = reader.get_inventory().await?;
    if frames.is_empty() {
        println!("No tags in the field.");
    } else {
        println!("{} tag(s) found:", frames.len());
        for frame in &frames {
            println!("  {}", frame);
        }
    }

    reader.disconnect().await?;
    println!("\nDone.");
    Ok(())
}
