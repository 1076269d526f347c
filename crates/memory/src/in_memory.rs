//! In-memory store, useful for testing and throwaway sessions.

use async_trait::async_trait;
use sleuth_core::error::StoreError;
use sleuth_core::store::{
    KeyValueStore, SocialStore, StoredRetweet, StoredTweet, StoredUser, TimelineEntry,
    sort_timeline,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct SocialTables {
    users: HashMap<String, StoredUser>,
    tweets: HashMap<String, StoredTweet>,
    retweets: HashMap<String, StoredRetweet>,
}

/// Implements both `KeyValueStore` and `SocialStore` over in-process maps.
#[derive(Default)]
pub struct InMemoryStore {
    kv: RwLock<BTreeMap<String, String>>,
    social: RwLock<SocialTables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.kv.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.kv.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.kv.write().await.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
        let kv = self.kv.read().await;
        Ok(kv
            .keys()
            .filter(|k| prefix.is_none_or(|p| k.starts_with(p)))
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.kv.write().await.clear();
        Ok(())
    }
}

#[async_trait]
impl SocialStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert_user(&self, user: &StoredUser) -> Result<(), StoreError> {
        self.social
            .write()
            .await
            .users
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn upsert_tweet(&self, tweet: &StoredTweet) -> Result<(), StoreError> {
        self.social
            .write()
            .await
            .tweets
            .insert(tweet.tweet_id.clone(), tweet.clone());
        Ok(())
    }

    async fn upsert_retweet(&self, retweet: &StoredRetweet) -> Result<(), StoreError> {
        self.social
            .write()
            .await
            .retweets
            .insert(retweet.retweet_id.clone(), retweet.clone());
        Ok(())
    }

    async fn get_user_by_screen_name(
        &self,
        screen_name: &str,
    ) -> Result<Option<StoredUser>, StoreError> {
        let social = self.social.read().await;
        Ok(social
            .users
            .values()
            .find(|u| u.screen_name.eq_ignore_ascii_case(screen_name))
            .cloned())
    }

    async fn get_tweets_by_user(&self, user_id: &str) -> Result<Vec<TimelineEntry>, StoreError> {
        let social = self.social.read().await;
        let mut entries: Vec<TimelineEntry> = social
            .tweets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .map(TimelineEntry::from)
            .chain(
                social
                    .retweets
                    .values()
                    .filter(|r| r.user_id == user_id)
                    .cloned()
                    .map(TimelineEntry::from),
            )
            .collect();
        sort_timeline(&mut entries);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sleuth_core::store::TweetKind;

    #[tokio::test]
    async fn kv_insert_or_replace() {
        let store = InMemoryStore::new();
        store.put("search:q", "v1").await.unwrap();
        store.put("search:q", "v2").await.unwrap();
        assert_eq!(store.get("search:q").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.list_keys(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn kv_prefix_listing_is_sorted() {
        let store = InMemoryStore::new();
        for key in ["search:b", "other", "search:a"] {
            store.put(key, "v").await.unwrap();
        }
        assert_eq!(
            store.list_keys(Some("search:")).await.unwrap(),
            vec!["search:a", "search:b"]
        );
        assert!(store.delete("other").await.unwrap());
        store.clear().await.unwrap();
        assert!(store.list_keys(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn social_timeline_newest_first() {
        let store = InMemoryStore::new();
        store
            .upsert_user(&StoredUser {
                user_id: "7".into(),
                screen_name: "Ferris".into(),
                created_at: Utc.timestamp_opt(0, 0).unwrap(),
            })
            .await
            .unwrap();
        store
            .upsert_tweet(&StoredTweet {
                tweet_id: "t".into(),
                user_id: "7".into(),
                created_at: Utc.timestamp_opt(10, 0).unwrap(),
                text: "older".into(),
            })
            .await
            .unwrap();
        store
            .upsert_retweet(&StoredRetweet {
                retweet_id: "r".into(),
                original_tweet_id: "o".into(),
                user_id: "7".into(),
                retweeted_at: Utc.timestamp_opt(20, 0).unwrap(),
                text: "newer".into(),
            })
            .await
            .unwrap();

        let user = store.get_user_by_screen_name("ferris").await.unwrap().unwrap();
        let timeline = store.get_tweets_by_user(&user.user_id).await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].kind, TweetKind::Retweet);
        assert_eq!(timeline[1].text, "older");
    }
}
