//! Purpose: Post snippets to a dpaste-compatible service and fetch them back.
//! Exports: `PasteClient`, `PostOptions`, `PostedPaste`, `Snippet`, `BodyShape`.
//! Role: Owns request building and response interpretation; I/O goes through transport traits.
//! Invariants: Usage errors (bad flags, empty content, bad reference) never reach the transport.
//! Invariants: One transport call per operation; failures surface as `Error`, never panics.
//! Invariants: Raw fetches accept both plain-text and HTML bodies (content sniffing).
use super::config::{PasteFormat, ServiceConfig};
use super::notice::Notice;
use super::transport::{ContentSource, HttpResponse, HttpTransport, PasteSink};
use crate::core::error::{Error, ErrorKind};
use crate::core::expires::Expiration;
use crate::core::fragment::{extract_pre, looks_like_html};
use crate::core::paste_ref;
use serde::Deserialize;
use tracing::debug;
use url::Url;

type ApiResult<T> = Result<T, Error>;

const MAX_HINT_BODY: usize = 200;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PostOptions {
    pub expires: Expiration,
    pub lexer: Option<String>,
}

impl PostOptions {
    pub fn new(expires: Expiration) -> Self {
        Self {
            expires,
            lexer: None,
        }
    }

    pub fn with_lexer(mut self, lexer: impl Into<String>) -> Self {
        self.lexer = Some(lexer.into());
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PostedPaste {
    pub url: String,
    pub expires: Expiration,
    /// Response body exactly as received.
    pub raw: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BodyShape {
    PlainText,
    Html,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snippet {
    /// Canonical raw-content URL the snippet was read from.
    pub url: String,
    pub text: String,
    pub shape: BodyShape,
    pub notice: Option<Notice>,
}

impl Snippet {
    /// Snippet text, optionally prefixed by a `# <url>` comment line and a blank line.
    pub fn render(&self, url_comment: bool) -> String {
        if url_comment {
            format!("# {}\n\n{}", self.url, self.text)
        } else {
            self.text.clone()
        }
    }
}

#[derive(Deserialize)]
struct JsonPaste {
    url: String,
}

pub struct PasteClient<T = HttpTransport> {
    config: ServiceConfig,
    transport: T,
}

impl PasteClient<HttpTransport> {
    pub fn new(config: ServiceConfig) -> Self {
        let transport = HttpTransport::new(&config);
        Self { config, transport }
    }
}

impl<T> PasteClient<T> {
    pub fn with_transport(config: ServiceConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Canonical raw-content URL for a hash or paste URL.
    pub fn raw_url(&self, reference: &str) -> String {
        paste_ref::raw_url(
            reference,
            self.config.base_url().as_str(),
            self.config.raw_template(),
        )
    }
}

impl<T: PasteSink> PasteClient<T> {
    /// Posts `content` and returns the response body unmodified.
    pub fn post_raw(&self, content: &str, options: &PostOptions) -> ApiResult<String> {
        if content.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("nothing to paste")
                .with_hint("Pass the snippet as arguments, with --file, or on stdin."));
        }

        let url = self.config.api_url();
        let mut form = vec![
            ("content", content),
            ("format", self.config.format().wire_value()),
            ("expires", options.expires.wire_value()),
        ];
        if let Some(lexer) = options.lexer.as_deref() {
            form.push(("lexer", lexer));
        }
        debug!(url = %url, expires = %options.expires, bytes = content.len(), "posting paste");

        let response = self.transport.post_form(url, &form)?;
        if !response.is_success() {
            return Err(status_error(&response, url));
        }
        Ok(response.body)
    }

    /// Posts `content` and extracts the paste URL from the response.
    pub fn post(&self, content: &str, options: &PostOptions) -> ApiResult<PostedPaste> {
        let raw = self.post_raw(content, options)?;
        let url = parse_paste_url(&raw, self.config.format())?;
        debug!(url = %url, "paste created");
        Ok(PostedPaste {
            url,
            expires: options.expires,
            raw,
        })
    }

    /// Validates expiration `flags` first, then posts.
    pub fn post_with_flags<S: AsRef<str>>(
        &self,
        content: &str,
        flags: &[S],
        lexer: Option<&str>,
    ) -> ApiResult<PostedPaste> {
        let expires = Expiration::from_flags(flags, self.config.default_expiration())?;
        let mut options = PostOptions::new(expires);
        if let Some(lexer) = lexer {
            options = options.with_lexer(lexer);
        }
        self.post(content, &options)
    }
}

impl<T: ContentSource> PasteClient<T> {
    /// Fetches a paste by hash or URL, unwrapping HTML pages when needed.
    pub fn fetch(&self, reference: &str) -> ApiResult<Snippet> {
        let raw = self.raw_url(reference);
        let url = Url::parse(&raw).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid paste reference")
                .with_url(raw.clone())
                .with_hint("Pass a paste hash (e.g. gA8U) or a full paste URL.")
                .with_source(err)
        })?;

        let response = self.transport.fetch(&url)?;
        if !response.is_success() {
            return Err(status_error(&response, &url));
        }

        let shape = if response.is_html() || looks_like_html(&response.body) {
            BodyShape::Html
        } else {
            BodyShape::PlainText
        };
        debug!(url = %url, ?shape, bytes = response.body.len(), "fetched paste");

        let (text, notice) = match shape {
            BodyShape::PlainText => (response.body, None),
            BodyShape::Html => {
                let text = extract_pre(&response.body);
                let notice = text.is_empty().then(|| {
                    Notice::new(
                        "empty",
                        url.as_str(),
                        "html response has no <pre> content; snippet is empty",
                    )
                    .with_detail("bytes", response.body.len())
                });
                (text, notice)
            }
        };

        Ok(Snippet {
            url: url.to_string(),
            text,
            shape,
            notice,
        })
    }
}

fn parse_paste_url(raw: &str, format: PasteFormat) -> ApiResult<String> {
    let url = match format {
        PasteFormat::Url => raw.trim().trim_matches('"').trim().to_string(),
        PasteFormat::Json => serde_json::from_str::<JsonPaste>(raw)
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("invalid response json")
                    .with_source(err)
            })?
            .url
            .trim()
            .to_string(),
    };
    if url.is_empty() {
        return Err(Error::new(ErrorKind::Internal).with_message("response did not contain a paste url"));
    }
    Ok(url)
}

fn status_error(response: &HttpResponse, url: &Url) -> Error {
    let kind = error_kind_from_status(response.status);
    let mut err = Error::new(kind)
        .with_message(format!(
            "request went bad ({}) - {}",
            response.status, response.reason
        ))
        .with_status(response.status)
        .with_url(url.as_str());
    let body = response.body.trim();
    if !body.is_empty() && body.len() <= MAX_HINT_BODY && !looks_like_html(body) {
        err = err.with_hint(format!("Service said: {body}"));
    }
    err
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        404 | 410 => ErrorKind::NotFound,
        401 | 403 => ErrorKind::Permission,
        _ => ErrorKind::Remote,
    }
}
