//! Purpose: Immutable endpoint configuration for the paste client.
//! Exports: `ServiceConfig`, `PasteFormat`, `DEFAULT_BASE_URL`.
//! Role: Replaces module-level endpoint constants so tests can target a stub server.
//! Invariants: `base_url` is http(s), has no query/fragment, and always ends with `/`.
//! Invariants: Values are fixed after construction; builders consume and return `Self`.
use crate::core::error::{Error, ErrorKind};
use crate::core::expires::Expiration;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://dpaste.de/";

type ApiResult<T> = Result<T, Error>;

/// Response shape requested from the create endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PasteFormat {
    /// Body is the paste URL, usually wrapped in double quotes.
    #[default]
    Url,
    /// Body is a JSON object with a `url` field.
    Json,
}

impl PasteFormat {
    pub fn wire_value(self) -> &'static str {
        match self {
            PasteFormat::Url => "URL",
            PasteFormat::Json => "json",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    base_url: Url,
    api_url: Url,
    raw_template: String,
    format: PasteFormat,
    default_expiration: Expiration,
    timeout: Option<Duration>,
}

impl ServiceConfig {
    /// Configuration for a dpaste-compatible service rooted at `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.as_ref())?;
        let api_url = base_url.join("api/").map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("cannot derive api url from base url")
                .with_url(base_url.as_str())
                .with_source(err)
        })?;
        let raw_template = format!("{base_url}{{hash}}/raw");
        Ok(Self {
            base_url,
            api_url,
            raw_template,
            format: PasteFormat::default(),
            default_expiration: Expiration::default(),
            timeout: None,
        })
    }

    pub fn with_api_url(mut self, api_url: impl AsRef<str>) -> ApiResult<Self> {
        let raw = api_url.as_ref();
        let url = Url::parse(raw).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid api url")
                .with_url(raw)
                .with_source(err)
        })?;
        ensure_http_scheme(&url, "api url")?;
        self.api_url = url;
        Ok(self)
    }

    pub fn with_format(mut self, format: PasteFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_expiration(mut self, expiration: Expiration) -> Self {
        self.default_expiration = expiration;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn raw_template(&self) -> &str {
        &self.raw_template
    }

    pub fn format(&self) -> PasteFormat {
        self.format
    }

    pub fn default_expiration(&self) -> Expiration {
        self.default_expiration
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL).expect("default base url is valid")
    }
}

fn normalize_base_url(raw: &str) -> ApiResult<Url> {
    let mut url = Url::parse(raw.trim()).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid base url")
            .with_url(raw)
            .with_source(err)
    })?;
    ensure_http_scheme(&url, "base url")?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn ensure_http_scheme(url: &Url, label: &str) -> ApiResult<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("{label} must use http or https scheme"))
            .with_url(url.as_str())),
    }
}
