//! Purpose: Name-to-handler table for the `%dpaste` / `%getdpaste` commands.
//! Exports: `CommandTable`, `Handler`.
//! Role: Lets the shell dispatch command lines without knowing their argument syntax.
//! Invariants: A leading `%` on the command name is ignored.
//! Invariants: Argument errors surface as `Usage` before any network call.
use std::collections::BTreeMap;
use std::io::Write;

use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;
use dpaste::api::{ContentSource, Error, ErrorKind, PasteSink};

use crate::command_dispatch::{GetArgs, PostArgs, Session, run_get, run_post, write_line};
use crate::{clap_error_hint, clap_error_summary};

/// Runs one command: `(session, argument text, cell body, output)`.
///
/// The return value, when present, is echoed by the caller.
pub(crate) type Handler<T> =
    fn(&Session<T>, &str, Option<&str>, &mut dyn Write) -> Result<Option<String>, Error>;

pub(crate) struct CommandTable<T> {
    handlers: BTreeMap<&'static str, Handler<T>>,
}

impl<T: PasteSink + ContentSource> CommandTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    pub(crate) fn with(mut self, name: &'static str, handler: Handler<T>) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    pub(crate) fn standard() -> Self {
        Self::new()
            .with("dpaste", post_handler::<T>)
            .with("post", post_handler::<T>)
            .with("getdpaste", get_handler::<T>)
            .with("get", get_handler::<T>)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    pub(crate) fn dispatch(
        &self,
        session: &Session<T>,
        name: &str,
        args: &str,
        cell: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<Option<String>, Error> {
        let name = name.trim_start_matches('%');
        let Some(handler) = self.handlers.get(name) else {
            let known: Vec<String> = self.names().map(|name| format!("%{name}")).collect();
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unknown command: {name}"))
                .with_hint(format!("Known commands: {}.", known.join(", "))));
        };
        handler(session, args, cell, out)
    }
}

fn post_handler<T: PasteSink + ContentSource>(
    session: &Session<T>,
    args: &str,
    cell: Option<&str>,
    out: &mut dyn Write,
) -> Result<Option<String>, Error> {
    let Some(mut parsed) = parse_args::<PostArgs>("dpaste", args, out)? else {
        return Ok(None);
    };
    // Keep the statement as typed rather than re-joining split words.
    if let Some(tail) = statement_tail(args, parsed.statement.len()) {
        parsed.statement = vec![tail.to_string()];
    }
    run_post(session, &parsed, cell, out)
}

fn get_handler<T: PasteSink + ContentSource>(
    session: &Session<T>,
    args: &str,
    _cell: Option<&str>,
    out: &mut dyn Write,
) -> Result<Option<String>, Error> {
    let Some(parsed) = parse_args::<GetArgs>("getdpaste", args, out)? else {
        return Ok(None);
    };
    run_get(session, &parsed, out)
}

/// Parses whitespace-separated `args`; `Ok(None)` means help was printed.
fn parse_args<P: Parser>(name: &str, args: &str, out: &mut dyn Write) -> Result<Option<P>, Error> {
    let argv = std::iter::once(name).chain(args.split_whitespace());
    match P::try_parse_from(argv) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) if matches!(err.kind(), ClapErrorKind::DisplayHelp) => {
            write_line(out, err.render().to_string().trim_end())?;
            Ok(None)
        }
        Err(err) => Err(Error::new(ErrorKind::Usage)
            .with_message(clap_error_summary(&err))
            .with_hint(clap_error_hint(&err))),
    }
}

/// Text of the last `count` whitespace-separated words of `line`, spacing intact.
fn statement_tail(line: &str, count: usize) -> Option<&str> {
    if count == 0 {
        return None;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    let first = words.get(words.len().checked_sub(count)?)?;
    let offset = first.as_ptr() as usize - line.as_ptr() as usize;
    Some(line[offset..].trim_end())
}

#[cfg(test)]
mod tests {
    use super::{CommandTable, statement_tail};
    use crate::ColorMode;
    use crate::command_dispatch::Session;
    use dpaste::api::{
        ContentSource, Error, ErrorKind, HttpResponse, PasteClient, PasteSink, ServiceConfig,
    };
    use std::cell::RefCell;
    use url::Url;

    #[derive(Default)]
    struct Recorder {
        posts: RefCell<Vec<Vec<(String, String)>>>,
        gets: RefCell<Vec<String>>,
        body: RefCell<String>,
    }

    fn ok(body: &str, content_type: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            reason: "OK".to_string(),
            content_type: Some(content_type.to_string()),
            body: body.to_string(),
        }
    }

    impl PasteSink for Recorder {
        fn post_form(&self, _url: &Url, form: &[(&str, &str)]) -> Result<HttpResponse, Error> {
            self.posts.borrow_mut().push(
                form.iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
            );
            Ok(ok("\"http://paste.test/AbCd\"", "text/plain"))
        }
    }

    impl ContentSource for Recorder {
        fn fetch(&self, url: &Url) -> Result<HttpResponse, Error> {
            self.gets.borrow_mut().push(url.to_string());
            Ok(ok(&self.body.borrow(), "text/plain"))
        }
    }

    fn session() -> Session<Recorder> {
        let config = ServiceConfig::new("http://paste.test/").expect("config");
        Session::new(
            PasteClient::with_transport(config, Recorder::default()),
            ColorMode::Never,
        )
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn post_line_prints_url_and_keeps_spacing() {
        let session = session();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        let value = table
            .dispatch(&session, "%dpaste", "-1d x  =  1", None, &mut out)
            .expect("post");
        assert_eq!(value, None);
        assert_eq!(String::from_utf8(out).expect("utf8"), "http://paste.test/AbCd\n");

        let posts = session.client().transport().posts.borrow();
        assert_eq!(posts.len(), 1);
        assert_eq!(field(&posts[0], "content"), Some("x  =  1"));
        assert_eq!(field(&posts[0], "expires"), Some("86000"));
    }

    #[test]
    fn output_flag_returns_bare_url_once() {
        let session = session();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        let value = table
            .dispatch(&session, "dpaste", "-o hello", None, &mut out)
            .expect("post");
        assert_eq!(value.as_deref(), Some("http://paste.test/AbCd"));
        assert!(out.is_empty());

        let mut out = Vec::new();
        let value = table
            .dispatch(&session, "dpaste", "-s hello", None, &mut out)
            .expect("post");
        assert_eq!(value, None);
        assert!(out.is_empty());
    }

    #[test]
    fn cell_body_is_posted_verbatim() {
        let session = session();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        table
            .dispatch(&session, "dpaste", "-1x", Some("def f():\n    return 1\n"), &mut out)
            .expect("post");
        let posts = session.client().transport().posts.borrow();
        assert_eq!(field(&posts[0], "content"), Some("def f():\n    return 1\n"));
        assert_eq!(field(&posts[0], "expires"), Some("onetime"));
    }

    #[test]
    fn conflicting_expiration_makes_no_request() {
        let session = session();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        let err = table
            .dispatch(&session, "%dpaste", "-1h -1d print(1)", None, &mut out)
            .expect_err("conflict");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.message(), Some("too many options for expiration"));
        assert!(session.client().transport().posts.borrow().is_empty());
    }

    #[test]
    fn never_flag_is_rejected_before_posting() {
        let session = session();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        let err = table
            .dispatch(&session, "dpaste", "-0 print(1)", None, &mut out)
            .expect_err("never");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(session.client().transport().posts.borrow().is_empty());
    }

    #[test]
    fn get_and_post_dash_g_fetch_the_same_url() {
        let session = session();
        *session.client().transport().body.borrow_mut() = "snippet".to_string();
        let table = CommandTable::standard();

        let mut first = Vec::new();
        table
            .dispatch(&session, "%getdpaste", "AbCd", None, &mut first)
            .expect("get");
        let mut second = Vec::new();
        table
            .dispatch(&session, "%dpaste", "-g http://paste.test/AbCd", None, &mut second)
            .expect("get via post");

        assert_eq!(first, b"snippet\n");
        assert_eq!(first, second);
        let gets = session.client().transport().gets.borrow();
        assert_eq!(gets.as_slice(), ["http://paste.test/AbCd/raw", "http://paste.test/AbCd/raw"]);
    }

    #[test]
    fn attached_get_reference_fetches_instead_of_posting() {
        let session = session();
        *session.client().transport().body.borrow_mut() = "fetched".to_string();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        table
            .dispatch(&session, "%dpaste", "-gAbCd", None, &mut out)
            .expect("get via post");
        assert_eq!(out, b"fetched\n");
        assert!(session.client().transport().posts.borrow().is_empty());
        assert_eq!(
            session.client().transport().gets.borrow().as_slice(),
            ["http://paste.test/AbCd/raw"]
        );
    }

    #[test]
    fn get_rejects_multiple_references() {
        let session = session();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        let err = table
            .dispatch(&session, "getdpaste", "AAAA BBBB", None, &mut out)
            .expect_err("two refs");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.message(), Some("only one hash currently supported"));
        assert!(session.client().transport().gets.borrow().is_empty());
    }

    #[test]
    fn unknown_command_lists_known_names() {
        let session = session();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        let err = table
            .dispatch(&session, "%pastebin", "x", None, &mut out)
            .expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.hint().is_some_and(|hint| hint.contains("%getdpaste")));
    }

    #[test]
    fn help_is_printed_not_failed() {
        let session = session();
        let table = CommandTable::standard();
        let mut out = Vec::new();
        let value = table
            .dispatch(&session, "dpaste", "--help", None, &mut out)
            .expect("help");
        assert_eq!(value, None);
        assert!(String::from_utf8(out).expect("utf8").contains("--expires"));
    }

    #[test]
    fn statement_tail_preserves_inner_spacing() {
        assert_eq!(statement_tail("-1d  a   b ", 2), Some("a   b"));
        assert_eq!(statement_tail("a", 1), Some("a"));
        assert_eq!(statement_tail("-s", 0), None);
        assert_eq!(statement_tail("a", 3), None);
    }
}
