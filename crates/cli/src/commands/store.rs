//! `sleuth store`: inspect and maintain the key-value store.

use sleuth::Stores;
use sleuth_config::AppConfig;

pub async fn list(config: AppConfig, prefix: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let stores = Stores::open(&config).await?;
    let keys = stores.kv.list_keys(prefix).await?;
    if keys.is_empty() {
        println!("No stored keys.");
    }
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

pub async fn get(config: AppConfig, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stores = Stores::open(&config).await?;
    match stores.kv.get(key).await? {
        Some(value) => println!("{value}"),
        None => return Err(format!("No value stored under {key:?}").into()),
    }
    Ok(())
}

pub async fn delete(config: AppConfig, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stores = Stores::open(&config).await?;
    if stores.kv.delete(key).await? {
        println!("Deleted {key:?}.");
    } else {
        println!("Nothing stored under {key:?}.");
    }
    Ok(())
}

pub async fn clear(config: AppConfig, confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("This deletes ALL stored search summaries permanently.");
        println!("Run with --confirm to proceed:");
        println!("  sleuth store clear --confirm");
        return Ok(());
    }

    let stores = Stores::open(&config).await?;
    stores.kv.clear().await?;
    println!("Store cleared.");
    Ok(())
}
