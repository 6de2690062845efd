use std::time::UNIX_EPOCH;

use crate::{
    commands::get_bot_avatar,
    constants::{version::get_version, POISE_VERSION, STARTUP_TIME},
    sync::{SyncState, SyncStatus},
    Context, Error,
};
use poise::serenity_prelude as serenity;

fn describe_sync(status: &SyncStatus) -> String {
    let last = match (status.state, status.last_result) {
        (SyncState::Fetching, _) => String::from("syncing right now..."),
        (_, None) => String::from("hasn't run yet"),
        (_, Some(SyncState::FetchFailed)) => format!(
            "last attempt failed: {}",
            status.last_error.as_deref().unwrap_or("unknown error")
        ),
        (_, Some(_)) => String::from("last attempt succeeded"),
    };

    match status.last_success {
        Some(at) => format!(
            "{last}\nlast success <t:{}:R>, {} failures so far",
            at.unix_timestamp(),
            status.failures
        ),
        None => format!("{last}\n{} failures so far", status.failures),
    }
}

/// get the bot's status.
#[poise::command(prefix_command)]
#[tracing::instrument(skip_all)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let (count, categories) = {
        let book = ctx.data().book.lock().await;

        (book.len(), book.categories().len())
    };

    let sync_status = ctx.data().syncer.status().await;
    let uptime = STARTUP_TIME.duration_since(UNIX_EPOCH)?.as_secs();

    ctx.send(poise::CreateReply::default().embed(
        serenity::CreateEmbed::new()
        .field(
            "about the bot",
            "quotebook keeps a shared collection of quotes, synced with a remote server, using the [poise](https://github.com/serenity-rs/poise) framework.".to_string(),
            false
        )
        .field("version", get_version(), false)
        .field("rust", format!("[{0}](https://releases.rs/docs/{0})", rustc_version_runtime::version()), true)
        .field("poise", format!("[{0}](https://docs.rs/crate/poise/{0})", POISE_VERSION), true)
        .field("quotes", format!("{} in {} categories", count, categories), true)
        .field("sync", describe_sync(&sync_status), false)
        .field("uptime", format!("<t:{}:R>", uptime), true)
        .thumbnail(get_bot_avatar(ctx))
    ))
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn describes_a_fresh_syncer() {
        assert_eq!(
            describe_sync(&SyncStatus::default()),
            "hasn't run yet\n0 failures so far"
        );
    }

    #[test]
    fn describes_a_failure_after_a_success() {
        let status = SyncStatus {
            state: SyncState::Idle,
            last_result: Some(SyncState::FetchFailed),
            last_success: Some(datetime!(2025-01-01 0:00 UTC)),
            last_error: Some(String::from("remote request timed out after 10s")),
            failures: 3,
        };

        assert_eq!(
            describe_sync(&status),
            "last attempt failed: remote request timed out after 10s\nlast success <t:1735689600:R>, 3 failures so far"
        );
    }
}
