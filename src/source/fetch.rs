use std::time::{Duration, Instant};

use reqwest::{Client, Url};
use scraper::Html;
use tracing::debug;

use crate::error::{Error, Result};

/// Fetches listing pages `{base}?page={n}` with a per-request timeout.
pub struct PageFetcher {
    client: Client,
    base: Url,
}

impl PageFetcher {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| Error::Config(format!("invalid source url {:?}: {}", base, e)))?;
        let builder = Client::builder().timeout(timeout);
        // Test stub sites listen on loopback; never route them through a proxy.
        #[cfg(test)]
        let builder = builder.no_proxy();
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("could not build http client: {}", e)))?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn page_url(&self, page: usize) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }

    /// One GET, no retry. Network failures, timeouts and non-2xx statuses are
    /// `Transport`; an unreadable body is `Parse`.
    pub async fn fetch(&self, page: usize) -> Result<Html> {
        let url = self.page_url(page);
        let start = Instant::now();

        let transport = |source| Error::Transport {
            page,
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?;

        let body = response.text().await.map_err(|e| Error::Parse {
            page,
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!(
            page,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "fetched page"
        );
        Ok(Html::parse_document(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubSite;

    #[test]
    fn page_url_appends_query() {
        let f = PageFetcher::new("https://example.com/product/all", Duration::from_secs(1)).unwrap();
        assert_eq!(f.page_url(0).as_str(), "https://example.com/product/all?page=0");
        assert_eq!(f.page_url(12).as_str(), "https://example.com/product/all?page=12");
    }

    #[test]
    fn page_url_keeps_existing_query() {
        let f = PageFetcher::new("https://example.com/all?sort=name", Duration::from_secs(1)).unwrap();
        assert_eq!(f.page_url(1).as_str(), "https://example.com/all?sort=name&page=1");
    }

    #[test]
    fn invalid_base_is_config_error() {
        assert!(matches!(
            PageFetcher::new("not a url", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn fetches_and_parses_page() {
        let site = StubSite::start(vec!["<html><body><h1>hello</h1></body></html>".into()]).await;
        let f = PageFetcher::new(&site.url(), Duration::from_secs(5)).unwrap();
        let doc = f.fetch(0).await.unwrap();
        let h1 = scraper::Selector::parse("h1").unwrap();
        let text: String = doc.select(&h1).next().unwrap().text().collect();
        assert_eq!(text, "hello");
        assert_eq!(site.requests(), vec![0]);
    }

    #[tokio::test]
    async fn missing_page_is_transport_error() {
        let site = StubSite::start(vec!["<html></html>".into()]).await;
        let f = PageFetcher::new(&site.url(), Duration::from_secs(5)).unwrap();
        let err = f.fetch(7).await.unwrap_err();
        assert!(matches!(err, Error::Transport { page: 7, .. }), "{}", err);
    }

    #[tokio::test]
    async fn slow_page_times_out() {
        let site =
            StubSite::start_with_latency(vec!["<html></html>".into()], Duration::from_secs(3)).await;
        let f = PageFetcher::new(&site.url(), Duration::from_millis(200)).unwrap();
        match f.fetch(0).await {
            Err(Error::Transport { source, .. }) => assert!(source.is_timeout(), "{}", source),
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let f = PageFetcher::new(&format!("http://{}/food", addr), Duration::from_secs(2)).unwrap();
        assert!(matches!(f.fetch(0).await, Err(Error::Transport { page: 0, .. })));
    }
}
