//! Purpose: HTTP collaborators used by the paste client.
//! Exports: `HttpResponse`, `PasteSink`, `ContentSource`, `HttpTransport`.
//! Role: Seam between paste semantics and the network; tests substitute fakes.
//! Invariants: Any HTTP status is returned as `Ok(HttpResponse)`; `Err` means transport failure.
//! Invariants: One request per call; no retries.
use super::config::ServiceConfig;
use crate::core::error::{Error, ErrorKind};
use tracing::debug;
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|value| value.to_ascii_lowercase().contains("text/html"))
    }
}

/// Outbound form POST (the create-paste call).
pub trait PasteSink {
    fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> ApiResult<HttpResponse>;
}

/// Outbound GET of a paste's raw endpoint.
pub trait ContentSource {
    fn fetch(&self, url: &Url) -> ApiResult<HttpResponse>;
}

impl<T: PasteSink + ?Sized> PasteSink for &T {
    fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> ApiResult<HttpResponse> {
        (**self).post_form(url, form)
    }
}

impl<T: ContentSource + ?Sized> ContentSource for &T {
    fn fetch(&self, url: &Url) -> ApiResult<HttpResponse> {
        (**self).fetch(url)
    }
}

/// Blocking `ureq` transport.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: &ServiceConfig) -> Self {
        let mut builder =
            ureq::AgentBuilder::new().user_agent(concat!("dpaste/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
        }
    }
}

impl PasteSink for HttpTransport {
    fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> ApiResult<HttpResponse> {
        debug!(url = %url, fields = form.len(), "POST form");
        let result = self
            .agent
            .post(url.as_str())
            .set("Accept", "text/plain, application/json")
            .send_form(form);
        into_http_response(result, url)
    }
}

impl ContentSource for HttpTransport {
    fn fetch(&self, url: &Url) -> ApiResult<HttpResponse> {
        debug!(url = %url, "GET");
        let result = self
            .agent
            .get(url.as_str())
            .set("Accept", "text/plain, text/html")
            .call();
        into_http_response(result, url)
    }
}

fn into_http_response(
    result: Result<ureq::Response, ureq::Error>,
    url: &Url,
) -> ApiResult<HttpResponse> {
    match result {
        Ok(response) | Err(ureq::Error::Status(_, response)) => read_response(response, url),
        Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
            .with_message("error while connecting")
            .with_url(url.as_str())
            .with_source(err)),
    }
}

fn read_response(response: ureq::Response, url: &Url) -> ApiResult<HttpResponse> {
    let status = response.status();
    let reason = response.status_text().to_string();
    let content_type = response.header("Content-Type").map(str::to_string);
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_url(url.as_str())
            .with_source(err)
    })?;
    debug!(status, content_type = content_type.as_deref().unwrap_or(""), bytes = body.len(), "response");
    Ok(HttpResponse {
        status,
        reason,
        content_type,
        body,
    })
}
