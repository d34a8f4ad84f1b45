//! Purpose: Line-oriented `%dpaste` / `%getdpaste` prompt over stdin.
//! Exports: `run`.
//! Role: Interactive front end for `CommandTable`; one command per line, or a `%%` cell.
//! Invariants: A failed command is reported on stderr and the loop continues.
//! Invariants: Returned values are echoed to the output, one per line.
use std::io::{BufRead, Write};

use dpaste::api::{ContentSource, Error, ErrorKind, PasteSink};
use tracing::debug;

use crate::command_dispatch::{Session, write_line};
use crate::command_table::CommandTable;
use crate::emit_error;

const PROMPT: &str = "dpaste> ";
const CELL_PROMPT: &str = "   ...: ";
const CELL_END: &str = "%%";

struct Cell {
    name: String,
    args: String,
    body: String,
}

pub(crate) fn run<T: PasteSink + ContentSource>(
    session: &Session<T>,
    table: &CommandTable<T>,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    interactive: bool,
) -> Result<(), Error> {
    if interactive {
        let names: Vec<String> = table.names().map(|name| format!("%{name}")).collect();
        write_line(
            out,
            &format!(
                "commands: {} (start a cell with %%dpaste, end it with %%; exit to quit)",
                names.join(", ")
            ),
        )?;
    }

    let mut cell: Option<Cell> = None;
    let mut line = String::new();
    loop {
        if interactive {
            let prompt = if cell.is_some() { CELL_PROMPT } else { PROMPT };
            write!(out, "{prompt}")
                .and_then(|()| out.flush())
                .map_err(write_error)?;
        }

        line.clear();
        let read = input.read_line(&mut line).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read shell input")
                .with_source(err)
        })?;
        if read == 0 {
            // EOF inside a cell still runs it.
            if let Some(cell) = cell.take() {
                run_one(session, table, &cell.name, &cell.args, Some(&cell.body), out)?;
            }
            return Ok(());
        }
        let text = line.trim_end_matches(['\n', '\r']);

        if let Some(open) = cell.as_mut() {
            if text.trim() == CELL_END {
                if let Some(cell) = cell.take() {
                    run_one(session, table, &cell.name, &cell.args, Some(&cell.body), out)?;
                }
            } else {
                open.body.push_str(text);
                open.body.push('\n');
            }
            continue;
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed, "exit" | "quit") {
            return Ok(());
        }
        if let Some(header) = trimmed.strip_prefix("%%") {
            let (name, args) = split_command(header);
            if name.is_empty() {
                let err = Error::new(ErrorKind::Usage)
                    .with_message("missing command after %%")
                    .with_hint("Start a cell with `%%dpaste [FLAGS]`.");
                emit_error(&err, session.color_mode());
                continue;
            }
            debug!(name, "cell started");
            cell = Some(Cell {
                name: name.to_string(),
                args: args.to_string(),
                body: String::new(),
            });
            continue;
        }
        let (name, args) = split_command(trimmed);
        run_one(session, table, name, args, None, out)?;
    }
}

/// Runs one command; only output failures end the loop.
fn run_one<T: PasteSink + ContentSource>(
    session: &Session<T>,
    table: &CommandTable<T>,
    name: &str,
    args: &str,
    cell: Option<&str>,
    out: &mut dyn Write,
) -> Result<(), Error> {
    match table.dispatch(session, name, args, cell, out) {
        Ok(Some(value)) => write_line(out, &value),
        Ok(None) => Ok(()),
        Err(err) => {
            debug!(name, kind = ?err.kind(), "command failed");
            emit_error(&err, session.color_mode());
            Ok(())
        }
    }
}

fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    }
}

fn write_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write output")
        .with_source(err)
}
