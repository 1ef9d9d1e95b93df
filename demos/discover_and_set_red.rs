//! Discover all Wiz lights on the network and set them to red.
//!
//! This example demonstrates:
//! - Discovery of Wiz bulbs on the local network
//! - Resolving each bulb's type before changing it
//! - Setting all color-capable lights to red
//!
//! Run with: cargo run --example discover_and_set_red

use std::time::Duration;
use wiz_pilot::{PilotBuilder, discover_bulbs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Discovering Wiz lights on the network...");

    // Discover bulbs with a 5-second timeout
    let bulbs = discover_bulbs(Duration::from_secs(5)).await?;

    if bulbs.is_empty() {
        println!("No lights found on the network.");
        return Ok(());
    }

    println!("Found {} light(s):", bulbs.len());
    for bulb in &bulbs {
        println!("  - IP: {}, MAC: {}", bulb.ip, bulb.mac);
    }

    let red = PilotBuilder::new().rgb(255, 0, 0)?;

    println!("\nSetting all lights to red...");

    for bulb in bulbs {
        let light = bulb.into_light(None);
        match light.get_bulb_type().await {
            Ok(bulb_type) if !bulb_type.features.color => {
                println!("  - Skipping {} ({:?} has no color)", light.ip(), bulb_type.bulb_class);
                continue;
            }
            Ok(_) => {}
            Err(e) => eprintln!("  ! Could not resolve the type of {}: {}", light.ip(), e),
        }

        match light.turn_on(&red).await {
            Ok(()) => println!("  ✓ Successfully set {} to red", light.ip()),
            Err(e) => eprintln!("  ✗ Failed to set {} to red: {}", light.ip(), e),
        }
        light.close().await;
    }

    println!("\nDone!");
    Ok(())
}
