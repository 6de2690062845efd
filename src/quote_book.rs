use std::{collections::HashSet, sync::Arc};

use rand::{seq::SliceRandom, Rng};
use tokio::sync::{watch, Mutex};

use crate::{
    error::{QuoteError, Result},
    models::quotes::{CategoryFilter, Quote, QuoteId, QuoteRecord},
    store::{KvStore, LocalStore, SessionCache},
};

pub type SharedBook<S> = Arc<Mutex<QuoteBook<S>>>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    /// items whose id was missing or already taken and got a fresh one.
    pub rekeyed: usize,
}

/// the quote collection. owns every quote, and persists after every mutation.
#[derive(Debug)]
pub struct QuoteBook<S> {
    quotes: Vec<Quote>,
    store: LocalStore<S>,
    session: SessionCache,
    revision: watch::Sender<u64>,
}

impl<S: KvStore> QuoteBook<S> {
    pub async fn open(store: LocalStore<S>) -> Self {
        let quotes = store.load().await;
        let (revision, _) = watch::channel(0);

        QuoteBook {
            quotes,
            store,
            session: SessionCache::default(),
            revision,
        }
    }

    pub fn into_shared(self) -> SharedBook<S> {
        Arc::new(Mutex::new(self))
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, id: &QuoteId) -> Option<&Quote> {
        self.quotes.iter().find(|quote| quote.id == *id)
    }

    #[cfg(test)]
    pub fn store(&self) -> &LocalStore<S> {
        &self.store
    }

    /// bumps every time the collection changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn changed(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// persists `quotes` and only then makes them the current collection.
    async fn commit(&mut self, quotes: Vec<Quote>) -> Result<()> {
        self.store.save(&quotes).await?;
        self.quotes = quotes;
        self.changed();

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_quote(
        &mut self,
        text: &str,
        category: &str,
        author: Option<&str>,
    ) -> Result<Quote> {
        let text = text.trim();
        let category = category.trim();

        if text.is_empty() {
            return Err(QuoteError::Validation("text"));
        }

        if category.is_empty() {
            return Err(QuoteError::Validation("category"));
        }

        let mut quote = Quote::new(QuoteId::local(), text, category);

        if let Some(author) = author.map(str::trim).filter(|author| !author.is_empty()) {
            quote = quote.with_author(author);
        }

        let mut quotes = self.quotes.clone();
        quotes.push(quote.clone());

        self.commit(quotes)
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when saving new quote"))?;

        tracing::info!(id = %quote.id, category = %quote.category, "added quote");

        Ok(quote)
    }

    /// appends every quote-shaped item of a JSON array. ids are only touched when
    /// missing or already present.
    #[tracing::instrument(skip_all)]
    pub async fn import_quotes(&mut self, raw: serde_json::Value) -> Result<ImportReport> {
        let serde_json::Value::Array(items) = raw else {
            return Err(QuoteError::import_format("expected a list of quotes"));
        };

        let mut taken: HashSet<QuoteId> = self.quotes.iter().map(|q| q.id.clone()).collect();
        let mut quotes = self.quotes.clone();
        let mut report = ImportReport::default();

        for item in items {
            match serde_json::from_value::<QuoteRecord>(item) {
                Ok(record) => {
                    let (quote, rekeyed) = record.admit(&mut taken);

                    quotes.push(quote);
                    report.imported += 1;
                    report.rekeyed += usize::from(rekeyed);
                }
                Err(e) => {
                    tracing::warn!(err = ?e, "skipping item that is not a quote");
                    report.skipped += 1;
                }
            }
        }

        if report.imported > 0 {
            self.commit(quotes).await.inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when saving imported quotes"),
            )?;
        }

        tracing::info!(
            imported = report.imported,
            skipped = report.skipped,
            rekeyed = report.rekeyed,
            "finished importing quotes"
        );

        Ok(report)
    }

    pub async fn import_bytes(&mut self, bytes: &[u8]) -> Result<ImportReport> {
        let raw = serde_json::from_slice(bytes)
            .map_err(|e| QuoteError::import_format(format!("not valid json ({e})")))?;

        self.import_quotes(raw).await
    }

    pub fn export_snapshot(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.quotes)?)
    }

    pub fn filter(&self, filter: &CategoryFilter) -> Vec<&Quote> {
        self.quotes.iter().filter(|q| filter.matches(q)).collect()
    }

    pub fn pick_random<R: Rng + ?Sized>(
        &self,
        filter: &CategoryFilter,
        rng: &mut R,
    ) -> Option<&Quote> {
        self.filter(filter).choose(rng).copied()
    }

    /// distinct categories, in the order they first appear.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();

        self.quotes
            .iter()
            .map(|quote| quote.category.as_str())
            .filter(|category| seen.insert(*category))
            .collect()
    }

    /// replaces the collection with the result of a sync merge.
    pub async fn apply_merged(&mut self, quotes: Vec<Quote>) -> Result<()> {
        self.commit(quotes).await
    }

    pub async fn last_filter(&self) -> CategoryFilter {
        self.store.load_last_filter().await
    }

    pub async fn set_last_filter(&self, filter: &CategoryFilter) -> Result<()> {
        self.store.save_last_filter(filter).await
    }

    pub async fn remember_viewed(&self, quote: &Quote) {
        if let Err(e) = self.session.remember(quote).await {
            tracing::warn!(err = ?e, "couldn't cache the last viewed quote");
        }
    }

    pub async fn last_viewed(&self) -> Option<Quote> {
        self.session.last_viewed().await
    }
}
