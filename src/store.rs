use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tokio::sync::RwLock;

use crate::{
    constants::{DEFAULT_QUOTES, LAST_FILTER_KEY, LAST_VIEWED_KEY, QUOTES_KEY},
    error::{QuoteError, Result},
    models::quotes::{CategoryFilter, Quote, QuoteRecord},
};

/// whole-value key-value persistence.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    db: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        SqliteStore { db }
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
                SELECT
                    value
                FROM kv_store
                WHERE key = $1;
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, key = %key, "an error occurred when reading from db"))?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO
                    kv_store (key, value)
                VALUES
                    ($1, $2)
                ON CONFLICT (key)
                DO UPDATE SET
                    value = excluded.value;
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, key = %key, "an error occurred when writing to db"))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query(
            r#"
                DELETE FROM kv_store
                WHERE key = $1;
            "#,
        )
        .bind(key)
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, key = %key, "an error occurred when deleting from db"))?;

        Ok(())
    }
}

/// process-lifetime storage. backs the session cache, and stands in for sqlite in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);

        Ok(())
    }
}

pub fn default_quotes() -> Vec<Quote> {
    DEFAULT_QUOTES
        .iter()
        .map(|(id, text, category)| Quote::new(*id, *text, *category))
        .collect()
}

/// typed access to the durable keys: the collection and the last used filter.
#[derive(Debug)]
pub struct LocalStore<S> {
    kv: S,
}

impl<S: KvStore> LocalStore<S> {
    pub fn new(kv: S) -> Self {
        LocalStore { kv }
    }

    #[cfg(test)]
    pub fn kv(&self) -> &S {
        &self.kv
    }

    /// never fails: anything unreadable is replaced with the built-in collection.
    #[tracing::instrument(skip_all)]
    pub async fn load(&self) -> Vec<Quote> {
        match self.try_load().await {
            Ok(Some((quotes, rekeyed))) => {
                if rekeyed > 0 {
                    tracing::info!(rekeyed, "assigned ids to persisted quotes, saving them back");

                    // failing here only means the ids get minted again on the next load.
                    if let Err(e) = self.save(&quotes).await {
                        tracing::warn!(err = ?e, "couldn't save back persisted quotes with their new ids");
                    }
                }

                quotes
            }
            Ok(None) => {
                tracing::info!("no persisted quotes found, using the default collection");
                default_quotes()
            }
            Err(e) => {
                tracing::warn!(err = ?e, "persisted quotes are unreadable, using the default collection");
                default_quotes()
            }
        }
    }

    async fn try_load(&self) -> Result<Option<(Vec<Quote>, usize)>> {
        let Some(raw) = self.kv.get(QUOTES_KEY).await? else {
            return Ok(None);
        };

        let raw: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| QuoteError::StorageRead(e.to_string()))?;

        let serde_json::Value::Array(items) = raw else {
            return Err(QuoteError::StorageRead("expected a list of quotes".to_string()));
        };

        let mut taken = HashSet::with_capacity(items.len());
        let mut quotes = Vec::with_capacity(items.len());
        let mut rekeyed = 0;

        for item in items {
            match serde_json::from_value::<QuoteRecord>(item) {
                Ok(record) => {
                    let (quote, fresh) = record.admit(&mut taken);
                    rekeyed += usize::from(fresh);
                    quotes.push(quote);
                }
                Err(e) => tracing::warn!(err = ?e, "skipping persisted item that is not a quote"),
            }
        }

        Ok(Some((quotes, rekeyed)))
    }

    pub async fn save(&self, quotes: &[Quote]) -> Result<()> {
        let raw = serde_json::to_string(quotes)?;

        self.kv.set(QUOTES_KEY, &raw).await
    }

    pub async fn load_last_filter(&self) -> CategoryFilter {
        match self.kv.get(LAST_FILTER_KEY).await {
            Ok(Some(filter)) => CategoryFilter::parse(&filter),
            Ok(None) => CategoryFilter::All,
            Err(e) => {
                tracing::warn!(err = ?e, "couldn't read the last used filter, showing all categories");
                CategoryFilter::All
            }
        }
    }

    pub async fn save_last_filter(&self, filter: &CategoryFilter) -> Result<()> {
        self.kv.set(LAST_FILTER_KEY, &filter.to_string()).await
    }
}

/// the last displayed quote. a convenience cache only, never a source of truth.
#[derive(Debug, Default)]
pub struct SessionCache {
    kv: MemoryStore,
}

impl SessionCache {
    pub async fn remember(&self, quote: &Quote) -> Result<()> {
        let raw = serde_json::to_string(quote)?;

        self.kv.set(LAST_VIEWED_KEY, &raw).await
    }

    pub async fn last_viewed(&self) -> Option<Quote> {
        let raw = self.kv.get(LAST_VIEWED_KEY).await.ok().flatten()?;

        match serde_json::from_str(&raw) {
            Ok(quote) => Some(quote),
            Err(e) => {
                tracing::warn!(err = ?e, "dropping unreadable last viewed quote");
                let _ = self.kv.remove(LAST_VIEWED_KEY).await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::models::quotes::QuoteId;

    async fn sqlite_store() -> SqliteStore {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::migrate!("./migrations").run(&db).await.unwrap();

        SqliteStore::new(db)
    }

    #[tokio::test]
    async fn sqlite_store_upserts_whole_values() {
        let store = sqlite_store().await;

        assert_eq!(store.get("quotes").await.unwrap(), None);

        store.set("quotes", "[]").await.unwrap();
        store.set("quotes", "[1]").await.unwrap();
        assert_eq!(store.get("quotes").await.unwrap().as_deref(), Some("[1]"));

        store.remove("quotes").await.unwrap();
        assert_eq!(store.get("quotes").await.unwrap(), None);
    }

    #[tokio::test]
    async fn load_falls_back_to_defaults() {
        let store = LocalStore::new(MemoryStore::default());

        assert_eq!(store.load().await, default_quotes());

        store.kv().set(QUOTES_KEY, "{not json").await.unwrap();
        assert_eq!(store.load().await, default_quotes());

        store.kv().set(QUOTES_KEY, r#"{"text": "X"}"#).await.unwrap();
        assert_eq!(store.load().await, default_quotes());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = LocalStore::new(sqlite_store().await);
        let quotes = vec![
            Quote::new(1, "X", "Life"),
            Quote::new("local-a", "Y", "Work").with_author("Me"),
        ];

        store.save(&quotes).await.unwrap();

        assert_eq!(store.load().await, quotes);
    }

    #[tokio::test]
    async fn legacy_quotes_get_ids_that_stick() {
        let store = LocalStore::new(MemoryStore::default());
        store
            .kv()
            .set(
                QUOTES_KEY,
                r#"[{"text": "X", "category": "Life"}, {"text": "Y", "category": "Work"}]"#,
            )
            .await
            .unwrap();

        let first = store.load().await;
        let second = store.load().await;

        assert_eq!(first.len(), 2);
        assert_ne!(first[0].id, first[1].id);
        assert!(matches!(first[0].id, QuoteId::Text(_)));
        assert_eq!(first, second);
    }

    struct ReadOnly(MemoryStore);

    #[async_trait]
    impl KvStore for ReadOnly {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key).await
        }

        async fn set(&self, _: &str, _: &str) -> Result<()> {
            Err(QuoteError::StorageRead("read only".to_string()))
        }

        async fn remove(&self, _: &str) -> Result<()> {
            Err(QuoteError::StorageRead("read only".to_string()))
        }
    }

    #[tokio::test]
    async fn legacy_quotes_load_even_if_saving_back_fails() {
        let kv = MemoryStore::default();
        kv.set(QUOTES_KEY, r#"[{"text": "X", "category": "Life"}]"#)
            .await
            .unwrap();
        let store = LocalStore::new(ReadOnly(kv));

        let quotes = store.load().await;

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].text, "X");
    }

    #[tokio::test]
    async fn load_skips_bad_items_and_keeps_the_rest() {
        let store = LocalStore::new(MemoryStore::default());
        store
            .kv()
            .set(
                QUOTES_KEY,
                r#"[{"id": 1, "text": "X", "category": "Life"}, {"id": 2, "text": "no category"}, 3]"#,
            )
            .await
            .unwrap();

        assert_eq!(store.load().await, vec![Quote::new(1, "X", "Life")]);

        store.kv().set(QUOTES_KEY, "[]").await.unwrap();
        assert_eq!(store.load().await, vec![]);
    }

    #[tokio::test]
    async fn last_filter_defaults_to_all() {
        let store = LocalStore::new(MemoryStore::default());

        assert_eq!(store.load_last_filter().await, CategoryFilter::All);

        store
            .save_last_filter(&CategoryFilter::parse("Life"))
            .await
            .unwrap();
        assert_eq!(
            store.load_last_filter().await,
            CategoryFilter::Category("Life".into())
        );
    }

    #[tokio::test]
    async fn session_cache_remembers_the_last_quote() {
        let session = SessionCache::default();

        assert_eq!(session.last_viewed().await, None);

        let quote = Quote::new(3, "Z", "Life");
        session.remember(&quote).await.unwrap();
        assert_eq!(session.last_viewed().await, Some(quote));
    }
}
