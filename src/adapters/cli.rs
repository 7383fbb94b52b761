//! CLI adapter
//!
//! Writes a shaped CLI response to the given streams and hands back the
//! process exit code.

use crate::error::Failure;
use crate::pipeline::interceptors::error_handling::{DEFAULT_STATUS, DEFAULT_TITLE};
use crate::pipeline::operation::{Operation, Outcome};
use crate::pipeline::response::{CliResponse, CliShaper, Response, ResponseShaper};
use serde_json::Value;
use std::io::{self, Write};

/// Exit code used when the response itself cannot be written
const EXIT_IO_ERROR: i32 = 74;

/// Write `response` to `out`/`err` and return its exit code
pub fn emit<O: Write, E: Write>(response: &CliResponse, out: &mut O, err: &mut E) -> io::Result<i32> {
    if let Some(stdout) = &response.stdout {
        if !stdout.is_empty() {
            writeln!(out, "{}", stdout)?;
        }
    }
    if let Some(stderr) = &response.stderr {
        if !stderr.is_empty() {
            writeln!(err, "{}", stderr)?;
        }
    }
    out.flush()?;
    err.flush()?;
    Ok(response.exit)
}

/// Run `operation` on `input` and emit whatever the run resolves to
pub fn run<O: Write, E: Write>(operation: &Operation, input: Value, out: &mut O, err: &mut E) -> i32 {
    let response = match operation.call(input) {
        Ok(Outcome::Response(Response::Cli(cli))) => cli,
        Ok(Outcome::Response(Response::Http(http))) => CliResponse {
            exit: if http.status < 400 { 0 } else { 1 },
            stdout: Some(http.body.to_string()),
            stderr: None,
        },
        Ok(Outcome::Result(result)) => into_cli(CliShaper.shape_result(Some(&result), None)),
        Err(error) => {
            let failure = Failure::from(error);
            tracing::error!(
                operation = %operation.name(),
                kind = %failure.kind,
                "Unhandled operation failure: {}",
                failure.message
            );
            into_cli(CliShaper.shape_failure(&failure, DEFAULT_STATUS, DEFAULT_TITLE, None))
        }
    };

    match emit(&response, out, err) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Failed to write command output: {}", e);
            EXIT_IO_ERROR
        }
    }
}

fn into_cli(response: Response) -> CliResponse {
    match response {
        Response::Cli(cli) => cli,
        Response::Http(http) => CliResponse {
            exit: 2,
            stdout: None,
            stderr: Some(http.body.to_string()),
        },
    }
}
