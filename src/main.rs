use constants::STARTUP_TIME;
use quote_book::SharedBook;
use remote::HttpRemote;
use store::SqliteStore;
use sync::Syncer;

#[derive(Clone)]
struct Data {
    book: SharedBook<SqliteStore>,
    syncer: Syncer<HttpRemote, SqliteStore>,
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

mod commands;
mod constants;
mod error;
mod init;
mod models;
mod notify;
mod quote_book;
mod remote;
mod store;
mod sync;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = &*STARTUP_TIME;

    let init::App {
        mut client,
        sync,
        telemetry,
    } = init::init().await?;

    let result = tokio::select! {
        result = client.start() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down...");
            Ok(())
        }
    };

    tracing::info!(running = sync.is_running(), "stopping quote sync...");
    sync.stop();
    client.shard_manager.shutdown_all().await;
    telemetry.shutdown();

    result.inspect_err(|e| tracing::error!(err = ?e, "the discord client stopped with an error"))?;

    Ok(())
}
