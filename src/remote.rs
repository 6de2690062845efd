use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

use crate::{
    error::{QuoteError, Result},
    models::{quotes::Quote, remote::RemotePost},
};

/// where quotes are synced from and pushed to.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Quote>>;

    /// sends a single quote. the response body is ignored.
    async fn push(&self, quote: &Quote) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct HttpRemote {
    client: reqwest::Client,
    url: String,
}

impl HttpRemote {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("quotebook/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(HttpRemote {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteSource for HttpRemote {
    #[tracing::instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<Quote>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when fetching remote quotes"),
            )?;

        let text = resp.text().await.inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when receiving response text"),
        )?;

        let posts: Vec<RemotePost> = serde_json::from_str(&text).inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when parsing remote quotes"),
        )?;

        tracing::debug!(count = posts.len(), "fetched remote quotes");

        Ok(posts.into_iter().map(Quote::from).collect())
    }

    #[tracing::instrument(skip_all, fields(url = %self.url, id = %quote.id))]
    async fn push(&self, quote: &Quote) -> Result<()> {
        self.client
            .post(&self.url)
            .json(quote)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when pushing quote"))
            .map_err(QuoteError::from)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;
    use crate::{
        constants::QUOTES_KEY,
        models::quotes::QuoteId,
        quote_book::QuoteBook,
        store::{KvStore, LocalStore, MemoryStore},
        sync::{SyncOutcome, Syncer},
    };

    /// answers a single request with a fixed response, returns the url to hit.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];

            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}/posts")
    }

    fn remote(url: &str) -> HttpRemote {
        HttpRemote::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trims_trailing_slash_from_url() {
        let remote = HttpRemote::new("https://example.com/posts/", Duration::from_secs(1)).unwrap();

        assert_eq!(remote.url(), "https://example.com/posts");
    }

    #[tokio::test]
    async fn fetch_maps_served_posts() {
        let url = serve_once(
            "200 OK",
            r#"[{"userId": 1, "id": 1, "title": "a", "body": "x"}, {"id": "b-2", "title": "b"}]"#,
        )
        .await;

        let quotes = remote(&url).fetch().await.unwrap();

        assert_eq!(
            quotes,
            vec![
                Quote::new(1, "a", "Remote"),
                Quote::new(QuoteId::from("b-2"), "b", "Remote"),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_fails_on_error_status() {
        let url = serve_once("500 Internal Server Error", "[]").await;

        let err = remote(&url).fetch().await.unwrap_err();

        assert!(err.is_network());
    }

    #[tokio::test]
    async fn fetch_fails_on_unparseable_body() {
        let url = serve_once("200 OK", "<html>not json</html>").await;

        let err = remote(&url).fetch().await.unwrap_err();

        assert!(matches!(err, QuoteError::Json(_)));
    }

    #[tokio::test]
    async fn unparseable_response_skips_the_merge() {
        let url = serve_once("200 OK", r#"{"posts": []}"#).await;

        let store = LocalStore::new(MemoryStore::default());
        store.save(&[Quote::new(1, "X", "Life")]).await.unwrap();
        let before = store.kv().get(QUOTES_KEY).await.unwrap();

        let book = QuoteBook::open(store).await.into_shared();
        let syncer = Syncer::new(remote(&url), book.clone(), Duration::from_secs(5));

        assert!(matches!(syncer.run_once().await, SyncOutcome::Failed(_)));

        let book = book.lock().await;
        assert_eq!(book.quotes(), [Quote::new(1, "X", "Life")]);
        assert_eq!(book.store().kv().get(QUOTES_KEY).await.unwrap(), before);
    }
}
