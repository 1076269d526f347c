//! `sleuth scrape`: scrape a timeline without involving the engine.

use sleuth::runtime::{Stores, build_scraper};
use sleuth_config::AppConfig;
use sleuth_core::event::{DomainEvent, EventBus};
use std::sync::Arc;

pub async fn run(config: AppConfig, handle: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stores = Stores::open(&config).await?;
    let events = Arc::new(EventBus::default());
    let scraper = build_scraper(&config, stores.social.clone(), events.clone())?;

    let mut rx = events.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let DomainEvent::TimelinePageStored { page, posts, .. } = event.as_ref() {
                eprintln!("  page {page}: {posts} posts");
            }
        }
    });

    let result = scraper.scrape(handle).await;
    drop(scraper);
    drop(events);
    let _ = progress.await;

    let report = result?;
    println!("{}", report.summary());
    Ok(())
}
