//! `sleuth onboard`: first-time setup.

use sleuth_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Sleuth: First-Time Setup");
    println!("=========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Add your engine API key (api_key, or SLEUTH_API_KEY / OPENAI_API_KEY)");
    println!("  2. For web search set SEARCH_API_KEY and GOOGLE_SEARCH_CX");
    println!("  3. For timelines set X_BEARER_TOKEN, or X_API_KEY and X_API_SECRET");
    println!("  4. Run: sleuth\n");
    Ok(())
}
