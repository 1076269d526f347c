pub mod ask;
pub mod chat;
pub mod onboard;
pub mod scrape;
pub mod store;
pub mod timeline;

use sleuth::Runtime;
use sleuth_config::AppConfig;
use sleuth_core::error::{Error, ProviderError};

/// Build the runtime, explaining how to supply a missing engine key.
pub async fn runtime(config: AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    match Runtime::from_config(config).await {
        Ok(runtime) => Ok(runtime),
        Err(Error::Provider(ProviderError::NotConfigured(reason))) => {
            eprintln!();
            eprintln!("  ERROR: {reason}");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    SLEUTH_API_KEY = 'sk-...'");
            eprintln!("    OPENAI_API_KEY = 'sk-...'");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            Err("No API key found. See above for setup instructions.".into())
        }
        Err(e) => Err(e.into()),
    }
}
