//! Purpose: `dpaste` CLI entry point.
//! Role: Binary crate root; parses args, resolves service config, runs commands.
//! Invariants: stdout carries only command output (URLs, snippets, JSON envelopes).
//! Invariants: Errors go to stderr, as text on a terminal and as JSON otherwise.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use dpaste::api::{
    DEFAULT_BASE_URL, Error, ErrorKind, Notice, PasteClient, PasteFormat, ServiceConfig,
    notice_json, to_exit_code,
};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod command_table;
mod shell;

use command_dispatch::Session;

const BASE_URL_ENV: &str = "DPASTE_BASE_URL";
const API_URL_ENV: &str = "DPASTE_API_URL";
const LOG_ENV: &str = "DPASTE_LOG";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => return handle_clap_error(err).map_err(|err| (err, ColorMode::Auto)),
    };
    init_tracing();

    let color_mode = cli.color;
    let config = resolve_config(&cli.service).map_err(|err| (err, color_mode))?;
    let session = Session::new(PasteClient::new(config), color_mode);

    command_dispatch::dispatch_command(cli.command, &session)
        .map_err(add_transport_hint)
        .map_err(add_not_found_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

/// Prints help/version output or converts a parse failure into a usage error.
fn handle_clap_error(err: clap::Error) -> Result<RunOutcome, Error> {
    match err.kind() {
        ClapErrorKind::DisplayHelp
        | ClapErrorKind::DisplayVersion
        | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            err.print().map_err(|io_err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to write help")
                    .with_source(io_err)
            })?;
            let exit_code = if matches!(
                err.kind(),
                ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                2
            } else {
                0
            };
            Ok(RunOutcome::with_code(exit_code))
        }
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(clap_error_summary(&err))
            .with_hint(clap_error_hint(&err))),
    }
}

#[derive(Parser)]
#[command(
    name = "dpaste",
    version,
    about = "Post code snippets to dpaste and fetch them back",
    long_about = None,
    after_help = r#"EXAMPLES
  $ dpaste post 'print(42)'                 # prints https://dpaste.de/XYZ
  $ dpaste post -1d -f script.py            # keep for one day
  $ url=$(dpaste post -s -o 'answer = 42')  # capture the URL only
  $ dpaste get XYZ                          # print the snippet
  $ dpaste get -u https://dpaste.de/XYZ     # prefix a '# <url>' comment line
  $ dpaste shell                            # %dpaste / %getdpaste prompt

ENVIRONMENT
  DPASTE_BASE_URL   service base URL (default https://dpaste.de/)
  DPASTE_API_URL    create endpoint (default <base>api/)
  DPASTE_LOG        log filter, e.g. debug (default warn)"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct ServiceArgs {
    #[arg(
        long,
        global = true,
        value_name = "URL",
        value_hint = ValueHint::Url,
        help = "Service base URL (env: DPASTE_BASE_URL)"
    )]
    base_url: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "URL",
        value_hint = ValueHint::Url,
        help = "Create endpoint URL (env: DPASTE_API_URL)"
    )]
    api_url: Option<String>,
    #[arg(long, global = true, value_name = "SECS", help = "Per-request timeout in seconds")]
    timeout: Option<u64>,
    #[arg(
        long,
        global = true,
        default_value = "url",
        value_enum,
        help = "Response format requested when posting: url|json"
    )]
    format: FormatArg,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Url,
    Json,
}

impl From<FormatArg> for PasteFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Url => PasteFormat::Url,
            FormatArg::Json => PasteFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Post a snippet (arguments, --file, or stdin) and print its URL
    Post(command_dispatch::PostArgs),
    /// Fetch a snippet by hash or URL
    Get(command_dispatch::GetArgs),
    /// Interactive %dpaste / %getdpaste prompt
    Shell,
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print version
    Version,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn resolve_config(args: &ServiceArgs) -> Result<ServiceConfig, Error> {
    let base_url = args
        .base_url
        .clone()
        .or_else(|| env_value(BASE_URL_ENV))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let mut config = ServiceConfig::new(&base_url)?.with_format(args.format.into());
    if let Some(api_url) = args.api_url.clone().or_else(|| env_value(API_URL_ENV)) {
        config = config.with_api_url(api_url)?;
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("timeout must be at least one second")
                .with_hint("Omit --timeout to use the transport default."));
        }
        config = config.with_timeout(Duration::from_secs(timeout));
    }
    Ok(config)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var_os(name)
        .map(|value: OsString| value.to_string_lossy().trim().to_string())
        .filter(|value| !value.is_empty())
}

fn add_transport_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() || err.url().is_none() {
        return err;
    }
    err.with_hint("Could not reach the service. Check your network connection and --base-url.")
}

fn add_not_found_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::NotFound || err.hint().is_some() {
        return err;
    }
    err.with_hint("The paste may have expired (onetime pastes vanish after two views).")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with DPASTE_LOG=debug and share command/context if it persists.",
    )
}

pub(crate) fn emit_json(value: &Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

pub(crate) fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

pub(crate) fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!("{label} {} ({})", notice.message, notice.url);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "paste not found".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Remote => "remote error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(url) = err.url() {
        inner.insert("url".to_string(), json!(url));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

pub(crate) fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(url) = err.url() {
        lines.push(format!(
            "{} {url}",
            colorize_label("url:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(status) = err.status() {
        lines.push(format!(
            "{} {status}",
            colorize_label("status:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

pub(crate) fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

pub(crate) fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let Some(usage) = usage else {
        return "Try `dpaste --help`.".to_string();
    };

    let command: Vec<&str> = usage
        .split_whitespace()
        .take_while(|token| {
            !token.starts_with('-') && !token.starts_with('<') && !token.starts_with('[')
        })
        .collect();
    if command.is_empty() {
        return "Try `dpaste --help`.".to_string();
    }
    format!("Try `{} --help`.", command.join(" "))
}
