use quick_cache::sync::Cache;
use quick_cache::Weighter;
use std::sync::Arc;

use crate::models::Tag;

pub type FgCache = Arc<Cache<CacheQuery, CacheValue, ValueWeighter>>;

pub fn new_cache() -> FgCache {
    Arc::new(Cache::with_weighter(10, 1 << 20, ValueWeighter))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheQuery {
    /// The whole tag catalog. There is no route that writes tags; they are
    /// loaded into the database out of band, and the cached copy is kept until
    /// the process restarts.
    AllTags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Tags { tags: Vec<Tag> },
}

#[derive(Clone)]
pub struct ValueWeighter;

impl Weighter<CacheQuery, CacheValue> for ValueWeighter {
    fn weight(&self, _key: &CacheQuery, val: &CacheValue) -> u64 {
        match val {
            CacheValue::Tags { tags } => tags
                .iter()
                .map(|t| (t.name.len() + t.slug.len() + 8) as u64)
                .sum::<u64>()
                .max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_are_loaded_once() {
        let cache = new_cache();
        let tags = vec![Tag {
            tag_id: 1,
            name: "Lunch".into(),
            slug: "lunch".into(),
        }];
        match cache.get_value_or_guard_async(&CacheQuery::AllTags).await {
            Ok(_) => panic!("cache should start empty"),
            Err(guard) => {
                guard
                    .insert(CacheValue::Tags { tags: tags.clone() })
                    .unwrap();
            }
        }
        assert_eq!(
            cache.get(&CacheQuery::AllTags),
            Some(CacheValue::Tags { tags })
        );
    }
}
