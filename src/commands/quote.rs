use poise::serenity_prelude::*;

use crate::{
    constants::{EXPORT_FILENAME, QUOTES_PER_PAGE},
    models::quotes::{CategoryFilter, Quote},
    sync::SyncOutcome,
    Context, Error,
};

/// imports bigger than this are refused before downloading.
const MAX_IMPORT_BYTES: u32 = 1024 * 1024;

/// keeps a full page under discord's 4096 character embed description limit.
const MAX_ENTRY_CHARS: usize = 400;

pub(crate) fn format_quote(quote: &Quote) -> String {
    format!(
        "\"{}\" — {} ({})",
        quote.text, quote.author, quote.category
    )
}

/// splits `text | author` into its parts. the last `|` wins, so the text itself may contain one.
pub(crate) fn split_author(content: &str) -> (&str, Option<&str>) {
    match content.rsplit_once('|') {
        Some((text, author)) if !author.trim().is_empty() => (text.trim(), Some(author.trim())),
        Some((text, _)) => (text.trim(), None),
        None => (content.trim(), None),
    }
}

fn truncate(entry: &str, max_chars: usize) -> String {
    match entry.char_indices().nth(max_chars - 1) {
        Some((end, _)) if entry.chars().count() > max_chars => format!("{}…", &entry[..end]),
        _ => entry.to_string(),
    }
}

pub(crate) fn paginate(quotes: &[Quote]) -> Vec<String> {
    quotes
        .chunks(QUOTES_PER_PAGE)
        .enumerate()
        .map(|(page, chunk)| {
            chunk
                .iter()
                .enumerate()
                .map(|(idx, quote)| {
                    let entry = format!(
                        "{}. {} *[{}]*",
                        idx + 1 + page * QUOTES_PER_PAGE,
                        format_quote(quote),
                        quote.id
                    );

                    format!("{}\n", truncate(&entry, MAX_ENTRY_CHARS))
                })
                .collect()
        })
        .collect()
}

async fn reply(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .reply(true)
            .allowed_mentions(CreateAllowedMentions::new().replied_user(false))
            .content(content),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    Ok(())
}

/// show a random quote, from the given category or the last one you picked with `filter`.
#[tracing::instrument(skip(ctx))]
#[poise::command(
    prefix_command,
    aliases("quotes"),
    subcommands(
        "add_quote",
        "list_quotes",
        "categories",
        "filter",
        "last",
        "export",
        "import",
        "sync",
        "push"
    )
)]
pub async fn quote(ctx: Context<'_>, #[rest] category: Option<String>) -> Result<(), Error> {
    let picked = {
        let book = ctx.data().book.lock().await;

        let filter = match category {
            Some(category) => CategoryFilter::parse(&category),
            None => book.last_filter().await,
        };

        let picked = book
            .pick_random(&filter, &mut rand::thread_rng())
            .cloned();

        if let Some(quote) = &picked {
            book.remember_viewed(quote).await;
        }

        picked.ok_or(filter)
    };

    match picked {
        Ok(quote) => reply(ctx, format_quote(&quote)).await,
        Err(CategoryFilter::All) => reply(ctx, "there are no quotes yet!").await,
        Err(CategoryFilter::Category(category)) => {
            reply(ctx, format!("no quotes available for \"{category}\".")).await
        }
    }
}

/// add a quote: `add <category> <text> [| author]`
#[tracing::instrument(skip(ctx))]
#[poise::command(prefix_command, rename = "add")]
pub async fn add_quote(
    ctx: Context<'_>,
    category: String,
    #[rest] content: String,
) -> Result<(), Error> {
    let (text, author) = split_author(&content);

    let result = ctx
        .data()
        .book
        .lock()
        .await
        .add_quote(text, &category, author)
        .await;

    match result {
        Ok(quote) => {
            reply(
                ctx,
                format!("added quote to \"{}\" as `{}`.", quote.category, quote.id),
            )
            .await
        }
        Err(e) if e.is_user_facing() => reply(ctx, format!("couldn't add that quote: {e}.")).await,
        Err(e) => Err(e.into()),
    }
}

/// list quotes, optionally only the ones in a category.
#[tracing::instrument(skip(ctx))]
#[poise::command(prefix_command, rename = "list")]
pub async fn list_quotes(ctx: Context<'_>, #[rest] category: Option<String>) -> Result<(), Error> {
    let filter = category
        .as_deref()
        .map(CategoryFilter::parse)
        .unwrap_or_default();

    let quotes: Vec<Quote> = ctx
        .data()
        .book
        .lock()
        .await
        .filter(&filter)
        .into_iter()
        .cloned()
        .collect();

    let pages = paginate(&quotes);

    if pages.is_empty() {
        return reply(ctx, format!("no quotes found for \"{filter}\"!")).await;
    }

    let title = match &filter {
        CategoryFilter::All => String::from("list of quotes"),
        CategoryFilter::Category(category) => format!("quotes in \"{category}\""),
    };

    let ctx_id = ctx.id();
    let author_id = ctx.author().id;
    let ids = PageButtons {
        first: format!("{}first", ctx_id),
        prev: format!("{}prev", ctx_id),
        next: format!("{}next", ctx_id),
        last: format!("{}last", ctx_id),
    };
    let mut current_page: usize = 0;

    let msg = ctx
        .send(
            poise::CreateReply::default()
                .reply(true)
                .allowed_mentions(CreateAllowedMentions::new().replied_user(false))
                .embed(page_embed(&title, &pages, current_page))
                .components(ids.row(current_page, pages.len())),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    while let Some(press) = collector::ComponentInteractionCollector::new(ctx)
        .filter(move |press| press.data.custom_id.starts_with(&ctx_id.to_string()))
        .timeout(std::time::Duration::from_secs(60))
        .await
    {
        if press.user.id != author_id {
            press
                .create_response(
                    ctx,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("you cannot interact with another user's invoked command!")
                            .ephemeral(true),
                    ),
                )
                .await
                .inspect_err(
                    |e| tracing::error!(err = ?e, "an error occurred when creating response"),
                )?;

            continue;
        }

        current_page = match press.data.custom_id.as_str() {
            id if id == ids.first => 0,
            id if id == ids.prev => current_page.saturating_sub(1),
            id if id == ids.next => (current_page + 1).min(pages.len() - 1),
            id if id == ids.last => pages.len() - 1,
            _ => continue,
        };

        press
            .create_response(
                ctx,
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(page_embed(&title, &pages, current_page))
                        .components(ids.row(current_page, pages.len())),
                ),
            )
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when creating response"),
            )?;
    }

    msg.into_message()
        .await?
        .edit(ctx, EditMessage::default().components(vec![]))
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when editing message"))?;

    Ok(())
}

struct PageButtons {
    first: String,
    prev: String,
    next: String,
    last: String,
}

impl PageButtons {
    fn row(&self, current_page: usize, page_count: usize) -> Vec<CreateActionRow> {
        let at_start = current_page == 0;
        let at_end = current_page + 1 >= page_count;

        vec![CreateActionRow::Buttons(vec![
            CreateButton::new(&self.first).emoji('⏮').disabled(at_start),
            CreateButton::new(&self.prev).emoji('◀').disabled(at_start),
            CreateButton::new(&self.next).emoji('▶').disabled(at_end),
            CreateButton::new(&self.last).emoji('⏭').disabled(at_end),
        ])]
    }
}

fn page_embed(title: &str, pages: &[String], current_page: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(pages[current_page].clone())
        .footer(CreateEmbedFooter::new(format!(
            "page {}/{}",
            current_page + 1,
            pages.len(),
        )))
}

/// list every category you can filter by.
#[tracing::instrument(skip_all)]
#[poise::command(prefix_command)]
pub async fn categories(ctx: Context<'_>) -> Result<(), Error> {
    let (categories, current) = {
        let book = ctx.data().book.lock().await;
        let categories: Vec<String> = book.categories().into_iter().map(String::from).collect();

        (categories, book.last_filter().await)
    };

    if categories.is_empty() {
        return reply(ctx, "there are no categories yet!").await;
    }

    let list = std::iter::once(String::from("all"))
        .chain(categories)
        .map(|category| {
            if category == current.to_string() {
                format!("- **{category}** (current)")
            } else {
                format!("- {category}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    ctx.send(
        poise::CreateReply::default()
            .reply(true)
            .allowed_mentions(CreateAllowedMentions::new().replied_user(false))
            .embed(CreateEmbed::default().title("categories").description(list)),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    Ok(())
}

/// remember a category (or `all`) for plain `quote` calls.
#[tracing::instrument(skip(ctx))]
#[poise::command(prefix_command)]
pub async fn filter(ctx: Context<'_>, #[rest] category: String) -> Result<(), Error> {
    let filter = CategoryFilter::parse(&category);

    ctx.data()
        .book
        .lock()
        .await
        .set_last_filter(&filter)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, filter = %filter, "an error occurred when saving filter"))?;

    reply(ctx, format!("now showing quotes from \"{filter}\".")).await
}

/// show the last quote that was displayed.
#[tracing::instrument(skip_all)]
#[poise::command(prefix_command)]
pub async fn last(ctx: Context<'_>) -> Result<(), Error> {
    let last = ctx.data().book.lock().await.last_viewed().await;

    match last {
        Some(quote) => reply(ctx, format_quote(&quote)).await,
        None => reply(ctx, "no quote has been shown yet!").await,
    }
}

/// download every quote as a json file.
#[tracing::instrument(skip_all)]
#[poise::command(prefix_command)]
pub async fn export(ctx: Context<'_>) -> Result<(), Error> {
    let snapshot = {
        let book = ctx.data().book.lock().await;

        if book.is_empty() {
            None
        } else {
            Some((book.export_snapshot()?, book.len()))
        }
    };

    let Some((snapshot, count)) = snapshot else {
        return reply(ctx, "there's nothing to export yet!").await;
    };

    ctx.send(
        poise::CreateReply::default()
            .reply(true)
            .allowed_mentions(CreateAllowedMentions::new().replied_user(false))
            .content(format!("here's your {count} quotes!"))
            .attachment(CreateAttachment::bytes(snapshot, EXPORT_FILENAME)),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    Ok(())
}

/// append the quotes of an attached json file.
#[tracing::instrument(skip_all)]
#[poise::command(prefix_command)]
pub async fn import(ctx: Context<'_>, file: Attachment) -> Result<(), Error> {
    if file.size > MAX_IMPORT_BYTES {
        return reply(ctx, "that file is too big to import!").await;
    }

    let bytes = file.download().await.inspect_err(
        |e| tracing::error!(err = ?e, filename = %file.filename, "an error occurred when downloading attachment"),
    )?;

    let result = ctx.data().book.lock().await.import_bytes(&bytes).await;

    match result {
        Ok(report) => {
            let mut content = format!("imported {} quotes.", report.imported);

            if report.skipped > 0 {
                content += &format!(" skipped {} entries that weren't quotes.", report.skipped);
            }

            if report.rekeyed > 0 {
                content += &format!(" {} quotes got new ids.", report.rekeyed);
            }

            reply(ctx, content).await
        }
        Err(e) if e.is_user_facing() => {
            reply(ctx, format!("failed to import quotes: {e}.")).await
        }
        Err(e) => Err(e.into()),
    }
}

/// fetch quotes from the server now, instead of waiting for the next sync.
#[tracing::instrument(skip_all)]
#[poise::command(prefix_command)]
pub async fn sync(ctx: Context<'_>) -> Result<(), Error> {
    let msg = ctx
        .send(
            poise::CreateReply::default()
                .reply(true)
                .allowed_mentions(CreateAllowedMentions::new().replied_user(false))
                .content("syncing... please wait warmly..."),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    let content = match ctx.data().syncer.run_once().await {
        SyncOutcome::Merged { remote, total } => {
            format!("synced {remote} quotes from the server, {total} quotes in total.")
        }
        SyncOutcome::Failed(reason) => format!("couldn't sync quotes with the server: {reason}"),
        SyncOutcome::Skipped => String::from("a sync is already running, try again in a bit."),
    };

    msg.edit(
        ctx,
        poise::CreateReply::default()
            .reply(true)
            .allowed_mentions(CreateAllowedMentions::new().replied_user(false))
            .content(content),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when editing message"))?;

    Ok(())
}

/// send every quote to the server.
#[tracing::instrument(skip_all)]
#[poise::command(prefix_command)]
pub async fn push(ctx: Context<'_>) -> Result<(), Error> {
    let msg = ctx
        .send(
            poise::CreateReply::default()
                .reply(true)
                .allowed_mentions(CreateAllowedMentions::new().replied_user(false))
                .content("pushing... please wait warmly..."),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    let report = ctx.data().syncer.push_all().await;

    let content = if report.failed == 0 {
        format!("pushed {} quotes to the server.", report.sent)
    } else {
        format!(
            "pushed {} quotes to the server, {} failed.",
            report.sent, report.failed
        )
    };

    msg.edit(
        ctx,
        poise::CreateReply::default()
            .reply(true)
            .allowed_mentions(CreateAllowedMentions::new().replied_user(false))
            .content(content),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when editing message"))?;

    Ok(())
}
