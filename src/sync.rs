use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::StreamExt;
use time::OffsetDateTime;
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tracing::Instrument;

use crate::{
    error::{QuoteError, Result},
    models::quotes::{Quote, QuoteId},
    notify::Notifier,
    quote_book::SharedBook,
    remote::RemoteSource,
    store::KvStore,
};

/// remote quotes first, in the order they were received, then every local quote whose id
/// the remote doesn't know about. a remote id that shows up twice keeps its first position
/// and its last value.
pub fn merge(local: &[Quote], remote: Vec<Quote>) -> Vec<Quote> {
    let mut positions: HashMap<QuoteId, usize> = HashMap::with_capacity(remote.len());
    let mut merged: Vec<Quote> = Vec::with_capacity(remote.len() + local.len());

    for quote in remote {
        match positions.get(&quote.id) {
            Some(&idx) => merged[idx] = quote,
            None => {
                positions.insert(quote.id.clone(), merged.len());
                merged.push(quote);
            }
        }
    }

    merged.extend(
        local
            .iter()
            .filter(|quote| !positions.contains_key(&quote.id))
            .cloned(),
    );

    merged
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    MergedAndPersisted,
    FetchFailed,
}

#[derive(Clone, Debug)]
pub struct SyncStatus {
    pub state: SyncState,
    /// how the most recent cycle ended.
    pub last_result: Option<SyncState>,
    pub last_success: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub failures: u64,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus {
            state: SyncState::Idle,
            last_result: None,
            last_success: None,
            last_error: None,
            failures: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Merged { remote: usize, total: usize },
    Failed(String),
    /// another cycle was still running.
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PushReport {
    pub sent: usize,
    pub failed: usize,
}

struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Syncer<R, S> {
    remote: Arc<R>,
    book: SharedBook<S>,
    timeout: Duration,
    in_flight: Arc<AtomicBool>,
    status: Arc<Mutex<SyncStatus>>,
}

impl<R, S> Clone for Syncer<R, S> {
    fn clone(&self) -> Self {
        Syncer {
            remote: self.remote.clone(),
            book: self.book.clone(),
            timeout: self.timeout,
            in_flight: self.in_flight.clone(),
            status: self.status.clone(),
        }
    }
}

impl<R, S> Syncer<R, S>
where
    R: RemoteSource + 'static,
    S: KvStore + 'static,
{
    pub fn new(remote: R, book: SharedBook<S>, timeout: Duration) -> Self {
        Syncer {
            remote: Arc::new(remote),
            book,
            timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(SyncStatus::default())),
        }
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.lock().await.clone()
    }

    /// one fetch-merge-persist cycle. failures are absorbed into the outcome.
    #[tracing::instrument(skip_all)]
    pub async fn run_once(&self) -> SyncOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("a sync is already in flight, skipping");
            return SyncOutcome::Skipped;
        }

        let _in_flight = InFlight(self.in_flight.clone());

        self.status.lock().await.state = SyncState::Fetching;

        let result = self.fetch_and_merge().await;
        let mut status = self.status.lock().await;
        status.state = SyncState::Idle;

        match result {
            Ok((remote, total)) => {
                tracing::info!(remote, total, "synced quotes with remote");

                status.last_result = Some(SyncState::MergedAndPersisted);
                status.last_success = Some(OffsetDateTime::now_utc());
                status.last_error = None;

                SyncOutcome::Merged { remote, total }
            }
            Err(e) => {
                if e.is_network() {
                    tracing::warn!(err = ?e, "couldn't reach the remote, will retry next tick");
                } else {
                    tracing::error!(err = ?e, "an error occurred when syncing quotes");
                }

                status.last_result = Some(SyncState::FetchFailed);
                status.last_error = Some(e.to_string());
                status.failures += 1;

                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_and_merge(&self) -> Result<(usize, usize)> {
        let remote = tokio::time::timeout(self.timeout, self.remote.fetch())
            .await
            .map_err(|_| QuoteError::Timeout(self.timeout))??;

        let fetched = remote.len();

        let mut book = self.book.lock().await;
        let merged = merge(book.quotes(), remote);
        let total = merged.len();

        if merged != book.quotes() {
            book.apply_merged(merged).await?;
        }

        Ok((fetched, total))
    }

    /// sends every quote on its own. a failed send is counted and otherwise ignored.
    #[tracing::instrument(skip_all)]
    pub async fn push_all(&self) -> PushReport {
        let quotes = self.book.lock().await.quotes().to_vec();
        let mut report = PushReport::default();

        for quote in &quotes {
            let result = tokio::time::timeout(self.timeout, self.remote.push(quote))
                .await
                .unwrap_or(Err(QuoteError::Timeout(self.timeout)));

            match result {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    tracing::warn!(err = ?e, id = %quote.id, "couldn't push quote");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(sent = report.sent, failed = report.failed, "finished pushing quotes");

        report
    }

    /// runs a cycle every `period` until stopped. failed cycles are reported through `notifier`.
    pub fn start(&self, period: Duration, notifier: Arc<dyn Notifier>) -> SyncHandle {
        let syncer = self.clone();

        let handle = tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                let task = futures::stream::unfold(
                    (interval, syncer, notifier),
                    |(mut interval, syncer, notifier)| async move {
                        interval.tick().await;

                        if let SyncOutcome::Failed(reason) = syncer.run_once().await {
                            notifier
                                .notify(&format!("couldn't sync quotes with the server: {reason}"))
                                .await;
                        }

                        Some(((), (interval, syncer, notifier)))
                    },
                );

                task.for_each(|_| async {}).await;
            }
            .in_current_span(),
        );

        SyncHandle { handle }
    }
}

pub struct SyncHandle {
    handle: JoinHandle<()>,
}

impl SyncHandle {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
