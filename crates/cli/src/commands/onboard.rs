//! `despensa onboard`: First-time setup.

use despensa_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🥫 Despensa — First-Time Setup");
    println!("==============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Add your API key to {} (or set OPENAI_API_KEY)", config_path.display());
    println!("   2. Adjust the [inventory.seed] section to your pantry");
    println!("   3. Run: despensa chat");
    println!("   4. For WhatsApp, fill in [whatsapp] and run: despensa serve\n");

    Ok(())
}
