//! Purpose: Hold top-level CLI command dispatch and the post/get runners for `dpaste`.
//! Exports: `dispatch_command`, `Session`, `PostArgs`, `GetArgs`, `run_post`, `run_get`.
//! Role: Keep `main.rs` focused on parse/bootstrap; shared by the CLI and the shell.
//! Invariants: stdout only receives URLs, snippets, and JSON envelopes.
//! Invariants: Argument validation completes before any network call.
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, ValueHint};
use dpaste::api::{ContentSource, Error, ErrorKind, HttpTransport, PasteClient, PasteSink};
use serde_json::json;

use super::{Cli, ColorMode, Command, RunOutcome, emit_json, emit_notice};
use crate::command_table::CommandTable;
use crate::shell;

pub(crate) struct Session<T = HttpTransport> {
    client: PasteClient<T>,
    color_mode: ColorMode,
}

impl<T> Session<T> {
    pub(crate) fn new(client: PasteClient<T>, color_mode: ColorMode) -> Self {
        Self { client, color_mode }
    }

    pub(crate) fn client(&self) -> &PasteClient<T> {
        &self.client
    }

    pub(crate) fn color_mode(&self) -> ColorMode {
        self.color_mode
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(
    after_help = r#"EXAMPLES
  $ dpaste post 'answer = 42'
  $ dpaste post -1x -f secret.py          # two views, then gone
  $ cat notes.md | dpaste post -1w --lexer markdown
  $ dpaste post -g XYZ                    # same as `dpaste get XYZ`

NOTES
  - Only one -1 flag may be given; -0 (never) is not supported by dpaste.de"#
)]
pub(crate) struct PostArgs {
    #[arg(
        short = '1',
        long = "expires",
        value_name = "TOKEN",
        help = "Expiration: x (onetime), h (hour, default), d (day), w (week)"
    )]
    pub(crate) expires: Vec<String>,
    #[arg(short = '0', long = "never", help = "Never expire (rejected by dpaste.de)")]
    pub(crate) never: bool,
    #[arg(short, long, help = "Do not print the URL")]
    pub(crate) silent: bool,
    #[arg(short, long, help = "Output the bare URL as the command's value")]
    pub(crate) output: bool,
    #[arg(
        short = 'g',
        long = "get",
        value_name = "REF",
        help = "Fetch this hash or URL instead of posting"
    )]
    pub(crate) get: Vec<String>,
    #[arg(short = 'u', long = "url-comment", help = "With -g: prefix a '# <url>' comment line")]
    pub(crate) url_comment: bool,
    #[arg(
        short = 'f',
        long = "file",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        conflicts_with = "statement",
        help = "Read the snippet from a file"
    )]
    pub(crate) file: Option<PathBuf>,
    #[arg(long, value_name = "NAME", help = "Syntax highlighting hint, e.g. python")]
    pub(crate) lexer: Option<String>,
    #[arg(long, help = "Print a JSON envelope instead of the bare URL")]
    pub(crate) json: bool,
    #[arg(
        trailing_var_arg = true,
        value_name = "STATEMENT",
        help = "Snippet text; words are joined with single spaces"
    )]
    pub(crate) statement: Vec<String>,
}

impl PostArgs {
    fn reads_stdin(&self) -> bool {
        self.get.is_empty() && self.statement.is_empty() && self.file.is_none()
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(
    after_help = r#"EXAMPLES
  $ dpaste get gA8U
  $ dpaste get https://dpaste.de/gA8U/raw
  $ dpaste get -u gA8U --to snippet.py"#
)]
pub(crate) struct GetArgs {
    #[arg(short = 'u', long = "url-comment", help = "Prefix a '# <url>' comment line")]
    pub(crate) url_comment: bool,
    #[arg(
        long = "to",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        help = "Write the snippet to a file instead of stdout"
    )]
    pub(crate) to: Option<PathBuf>,
    #[arg(value_name = "REF", help = "Paste hash or URL (with or without /raw)")]
    pub(crate) references: Vec<String>,
}

pub(super) fn dispatch_command(command: Command, session: &Session) -> Result<RunOutcome, Error> {
    match command {
        Command::Post(args) => {
            let cell = if args.reads_stdin() {
                Some(read_stdin_snippet()?)
            } else {
                None
            };
            let mut stdout = io::stdout().lock();
            if let Some(value) = run_post(session, &args, cell.as_deref(), &mut stdout)? {
                write_line(&mut stdout, &value)?;
            }
            Ok(RunOutcome::ok())
        }
        Command::Get(args) => {
            let mut stdout = io::stdout().lock();
            run_get(session, &args, &mut stdout)?;
            Ok(RunOutcome::ok())
        }
        Command::Shell => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            let table = CommandTable::standard();
            shell::run(
                session,
                &table,
                &mut stdin.lock(),
                &mut io::stdout().lock(),
                interactive,
            )?;
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "dpaste", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            if io::stdout().is_terminal() {
                println!("dpaste {}", env!("CARGO_PKG_VERSION"));
            } else {
                emit_json(&json!({
                    "name": "dpaste",
                    "version": env!("CARGO_PKG_VERSION"),
                }));
            }
            Ok(RunOutcome::ok())
        }
    }
}

/// Posts a snippet; returns the URL as a value when `--output` is set.
///
/// `cell` (stdin or a shell cell body) takes precedence over `--file` and the
/// statement words.
pub(crate) fn run_post<T: PasteSink + ContentSource>(
    session: &Session<T>,
    args: &PostArgs,
    cell: Option<&str>,
    out: &mut dyn Write,
) -> Result<Option<String>, Error> {
    if let Some(reference) = args.get.first() {
        fetch_snippet(session, reference, args.url_comment, None, out)?;
        return Ok(None);
    }

    let content = match (cell, &args.file) {
        (Some(cell), _) => cell.to_string(),
        (None, Some(path)) => read_snippet_file(path)?,
        (None, None) => args.statement.join(" "),
    };

    let mut flags = args.expires.clone();
    if args.never {
        flags.push("0".to_string());
    }
    let posted = session
        .client()
        .post_with_flags(&content, &flags, args.lexer.as_deref())?;

    if args.json {
        let raw_url = session.client().raw_url(&posted.url);
        let value = json!({
            "paste": {
                "url": posted.url,
                "raw_url": raw_url,
                "expires": posted.expires.label(),
            }
        });
        let encoded = serde_json::to_string(&value).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode paste json")
                .with_source(err)
        })?;
        write_line(out, &encoded)?;
        return Ok(None);
    }
    if args.output {
        return Ok(Some(posted.url));
    }
    if !args.silent {
        write_line(out, &posted.url)?;
    }
    Ok(None)
}

pub(crate) fn run_get<T: ContentSource>(
    session: &Session<T>,
    args: &GetArgs,
    out: &mut dyn Write,
) -> Result<Option<String>, Error> {
    let reference = match args.references.as_slice() {
        [reference] => reference,
        [] => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("missing paste hash or url")
                .with_hint("Use `dpaste get <hash>` or `dpaste get <url>`."));
        }
        _ => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("only one hash currently supported")
                .with_hint("Fetch pastes one at a time."));
        }
    };
    fetch_snippet(session, reference, args.url_comment, args.to.as_deref(), out)?;
    Ok(None)
}

fn fetch_snippet<T: ContentSource>(
    session: &Session<T>,
    reference: &str,
    url_comment: bool,
    to: Option<&Path>,
    out: &mut dyn Write,
) -> Result<(), Error> {
    let snippet = session.client().fetch(reference)?;
    if let Some(notice) = &snippet.notice {
        emit_notice(notice, session.color_mode());
    }
    let rendered = snippet.render(url_comment);
    match to {
        Some(path) => fs::write(path, rendered).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to write {}", path.display()))
                .with_hint("Check that the directory exists and is writable.")
                .with_source(err)
        }),
        None if rendered.is_empty() || rendered.ends_with('\n') => write_all(out, &rendered),
        None => write_line(out, &rendered),
    }
}

fn read_stdin_snippet() -> Result<String, Error> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("nothing to paste")
            .with_hint("Pass the snippet as arguments, with --file, or pipe it on stdin."));
    }
    let mut content = String::new();
    stdin.read_to_string(&mut content).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read snippet from stdin")
            .with_source(err)
    })?;
    Ok(content)
}

fn read_snippet_file(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read {}", path.display()))
            .with_hint("Check the path passed to --file.")
            .with_source(err)
    })
}

fn write_all(out: &mut dyn Write, text: &str) -> Result<(), Error> {
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}

pub(crate) fn write_line(out: &mut dyn Write, text: &str) -> Result<(), Error> {
    write_all(out, &format!("{text}\n"))
}
