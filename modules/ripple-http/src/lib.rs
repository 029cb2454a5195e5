//! `reqwest` transport for network actions (`data-get`, `data-post`, ...).

pub mod error;

pub use error::{HttpError, Result};

use std::time::Duration;

use async_trait::async_trait;
use ripple_engine::{HttpConfig, HttpRequest, HttpResponse, Transport, Verb};

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    /// Absolute URLs pass through; relative ones are joined onto the base URL.
    pub fn resolve(&self, url: &str) -> Result<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        let Some(base) = &self.base_url else {
            return Err(HttpError::RelativeUrl(url.to_string()));
        };
        Ok(format!("{base}/{}", url.trim_start_matches('/')))
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = self.resolve(&request.url)?;
        let method = match request.verb {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            // Rendered like any other response.
            tracing::warn!(verb = %request.verb, url = %url, status = status.as_u16(), "Non-success response");
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(HttpResponse {
            content_type,
            body: resp.text().await?,
        })
    }
}

#[async_trait(?Send)]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> ripple_engine::Result<HttpResponse> {
        Ok(self.execute(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base_url: Option<&str>) -> ReqwestTransport {
        ReqwestTransport::new(&HttpConfig {
            base_url: base_url.map(String::from),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn joins_relative_urls_onto_base() {
        let t = transport(Some("http://localhost:8080/"));
        assert_eq!(t.resolve("/items").unwrap(), "http://localhost:8080/items");
        assert_eq!(t.resolve("items/1").unwrap(), "http://localhost:8080/items/1");
        assert_eq!(t.resolve("https://example.com/x").unwrap(), "https://example.com/x");
    }

    #[test]
    fn relative_urls_need_a_base() {
        let t = transport(None);
        assert!(matches!(t.resolve("/items"), Err(HttpError::RelativeUrl(_))));
    }

    #[tokio::test]
    async fn relative_url_failure_surfaces_as_transport_error() {
        let t = transport(None);
        let request = HttpRequest {
            url: "/items".into(),
            verb: Verb::Get,
            headers: Vec::new(),
            body: None,
        };
        let err = t.send(request).await.unwrap_err();
        assert!(matches!(err, ripple_engine::RippleError::Transport(_)));
    }
}
