//! `despensa inventory`: Print the configured pantry.

use despensa_config::AppConfig;

use crate::runtime::seeded_store;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = seeded_store(&config)?;

    println!("{}", despensa_tools::inventory::lookup(&store, None));
    println!();
    println!("{}", despensa_tools::inventory::restock_suggestion(&store));

    Ok(())
}
