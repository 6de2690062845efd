use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::Context as _;
use poise::serenity_prelude::{self as serenity, *};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use tracing::Instrument;

use crate::{
    commands,
    constants::{
        DEFAULT_REMOTE_URL, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_SYNC_TIMEOUT_SECS,
        NOTIFICATION_LINGER_SECS,
    },
    notify::{ChannelNotifier, LogNotifier, Notifier},
    quote_book::QuoteBook,
    remote::HttpRemote,
    store::{LocalStore, SqliteStore},
    sync::{SyncHandle, Syncer},
    telemetry::{self, Telemetry},
    Data,
};

pub struct App {
    pub client: Client,
    pub sync: SyncHandle,
    pub telemetry: Telemetry,
}

struct SyncConfig {
    remote_url: String,
    interval: Duration,
    timeout: Duration,
}

fn env_secs(name: &str, default: u64) -> Duration {
    let secs = match std::env::var(name) {
        Ok(value) => value.parse::<u64>().ok().filter(|secs| *secs > 0).unwrap_or_else(|| {
            tracing::warn!(value = %value, "invalid {name}, defaulting to {default} seconds.");
            default
        }),
        Err(_) => default,
    };

    Duration::from_secs(secs)
}

fn init_sync_config() -> SyncConfig {
    let remote_url =
        std::env::var("QUOTES_REMOTE_URL").unwrap_or_else(|_| DEFAULT_REMOTE_URL.to_string());

    let config = SyncConfig {
        remote_url,
        interval: env_secs("QUOTES_SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS),
        timeout: env_secs("QUOTES_SYNC_TIMEOUT_SECS", DEFAULT_SYNC_TIMEOUT_SECS),
    };

    tracing::info!(
        remote_url = %config.remote_url,
        interval = ?config.interval,
        timeout = ?config.timeout,
        "loaded sync configuration"
    );

    config
}

async fn init_database() -> anyhow::Result<Pool<Sqlite>> {
    let db_url = std::env::var("DATABASE_URL").context("missing DATABASE_URL")?;

    tracing::info!("initializing database connection...");
    let opts = SqliteConnectOptions::from_str(&db_url)
        .context("invalid DATABASE_URL")?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
    let db = SqlitePoolOptions::new()
        .max_connections(20)
        .connect_with(opts)
        .await?;

    tracing::info!("running migrations...");
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("finished running migrations!");

    Ok(db)
}

fn init_notify_channel_id() -> Option<ChannelId> {
    let notify_channel_id = std::env::var("NOTIFY_CHANNEL_ID")
        .ok()
        .and_then(|id| id.parse::<u64>().ok())
        .map(|id| {
            tracing::info!("sending sync notifications to channel with id {}.", id);
            ChannelId::new(id)
        });

    if notify_channel_id.is_none() {
        tracing::warn!("no notification channel id found. sync failures will only be logged.");
    }

    notify_channel_id
}

async fn init_discord_client(token: &str, data: Data) -> anyhow::Result<Client> {
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::help::help(),
                commands::status::status(),
                commands::quote::quote(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("q>".into()),
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands)
                    .await
                    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when registering commands"))?;

                Ok(data)
            }.in_current_span())
        })
        .build();

    let client = ClientBuilder::new(token, intents)
        .framework(framework)
        .activity(serenity::ActivityData {
            name: "q>quote".into(),
            kind: serenity::ActivityType::Listening,
            state: None,
            url: None,
        })
        .await?;

    Ok(client)
}

fn spawn_background_tasks(
    client: &Client,
    data: &Data,
    notify_channel_id: Option<ChannelId>,
    interval: Duration,
) -> SyncHandle {
    let notifier: Arc<dyn Notifier> = match notify_channel_id {
        Some(channel_id) => Arc::new(ChannelNotifier::new(
            client.http.clone(),
            channel_id,
            Duration::from_secs(NOTIFICATION_LINGER_SECS),
        )),
        None => Arc::new(LogNotifier),
    };

    let book = data.book.clone();

    tokio::spawn(
        async move {
            let mut changes = book.lock().await.subscribe();

            while changes.changed().await.is_ok() {
                let revision = *changes.borrow_and_update();
                let count = book.lock().await.len();

                tracing::debug!(revision, count, "quote collection changed");
            }
        }
        .in_current_span(),
    );

    tracing::info!("initialized quote sync!");

    data.syncer.start(interval, notifier)
}

pub async fn init() -> anyhow::Result<App> {
    let telemetry = telemetry::init_telemetry().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("initializing... please wait warmly.");

    let token = std::env::var("DISCORD_TOKEN").context("missing DISCORD_TOKEN")?;

    let db = init_database().await?;
    let sync_config = init_sync_config();
    let notify_channel_id = init_notify_channel_id();

    let book = QuoteBook::open(LocalStore::new(SqliteStore::new(db)))
        .await
        .into_shared();
    let count = book.lock().await.len();
    tracing::info!(count, "loaded quotes");

    let remote = HttpRemote::new(&sync_config.remote_url, sync_config.timeout)?;
    tracing::info!(url = %remote.url(), "initialized remote quote source");

    let syncer = Syncer::new(remote, book.clone(), sync_config.timeout);

    let data = Data { book, syncer };

    let client = init_discord_client(&token, data.clone()).await?;
    let sync = spawn_background_tasks(&client, &data, notify_channel_id, sync_config.interval);

    tracing::info!("finished initializing!");

    Ok(App {
        client,
        sync,
        telemetry,
    })
}
