//! JSON output for CLI commands
//!
//! Every response is a single line on stdout. `watch` emits one line per
//! change, so each line is flushed as soon as it is written.

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

fn ok_line(data: Value) -> Value {
    json!({ "status": "ok", "data": data })
}

fn error_line(code: &str, message: &str) -> Value {
    json!({ "status": "error", "code": code, "message": message })
}

fn emit<W: Write>(out: &mut W, line: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, line)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Print `data` wrapped in an ok envelope
pub fn write_response(data: Value) -> CliResult<()> {
    emit(&mut io::stdout().lock(), &ok_line(data))
}

/// Print an error envelope
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    emit(&mut io::stdout().lock(), &error_line(code, message))
}
