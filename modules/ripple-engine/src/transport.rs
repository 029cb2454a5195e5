//! Network transport seam used by HTTP actions.

use async_trait::async_trait;
use serde_json::Value;

use crate::codec;
use crate::error::Result;

/// HTTP verb of a network action, selected by its declaration marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 4] = [Verb::Get, Verb::Post, Verb::Patch, Verb::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// The declaration attribute carrying the URL for this verb.
    pub fn attribute(&self) -> &'static str {
        match self {
            Verb::Get => "data-get",
            Verb::Post => "data-post",
            Verb::Patch => "data-patch",
            Verb::Delete => "data-delete",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub verb: Verb,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    /// Structured when the content type is JSON, raw text otherwise.
    pub fn decode(&self) -> Value {
        let is_json = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"));
        if is_json {
            codec::decode(&self.body)
        } else {
            Value::String(self.body.clone())
        }
    }
}

/// Issues HTTP requests for network actions.
///
/// The engine is single-threaded, so futures need not be `Send`.
#[async_trait(?Send)]
pub trait Transport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
