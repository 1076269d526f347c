//! `sleuth ask`: answer one query and exit.

use sleuth_config::AppConfig;

pub async fn run(config: AppConfig, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = super::runtime(config).await?;

    eprint!("  Thinking...");
    let result = runtime.agent.run(message).await;
    eprint!("\r              \r");

    let outcome = result?;
    println!("{}", outcome.answer);
    Ok(())
}
