//! `sleuth timeline`: print a stored timeline.

use sleuth::Stores;
use sleuth_config::AppConfig;
use sleuth_core::action::normalize_handle;
use sleuth_core::store::TweetKind;

pub async fn run(
    config: AppConfig,
    handle: &str,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stores = Stores::open(&config).await?;
    let handle = normalize_handle(handle);

    let Some(user) = stores.social.get_user_by_screen_name(handle).await? else {
        println!("No stored user @{handle}. Run `sleuth scrape {handle}` first.");
        return Ok(());
    };

    let entries = stores.social.get_tweets_by_user(&user.user_id).await?;
    println!(
        "@{} (id {}, joined {}): {} stored posts",
        user.screen_name,
        user.user_id,
        user.created_at.format("%Y-%m-%d"),
        entries.len()
    );
    for entry in entries.iter().take(limit.unwrap_or(usize::MAX)) {
        let tag = match entry.kind {
            TweetKind::Tweet => "  ",
            TweetKind::Retweet => "RT",
        };
        println!("  {} {tag} {}", entry.at.format("%Y-%m-%d %H:%M"), entry.text);
    }
    Ok(())
}
