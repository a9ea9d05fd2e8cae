use std::{
    ffi::OsString,
    io,
    process::{Command, Stdio},
};

use crate::error::{Error, Result};

/// What we get back from an external process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The one seam between the pipeline and the programs it shells out to.
/// Runs `program` to completion and hands back its exit code and stdout.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> io::Result<ToolOutput>;
}

/// Runs real processes. Stderr is inherited so tool diagnostics reach the
/// user directly.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[OsString]) -> io::Result<ToolOutput> {
        debug!("running `{}` with {} argument(s)", program, args.len());
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: output.stdout,
        })
    }
}

/// Runs `program` and turns launch failures and non-zero exits into
/// `Error::ExternalTool`.
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[OsString],
) -> Result<Vec<u8>> {
    let output = runner
        .run(program, args)
        .map_err(|e| Error::external_tool(program, format!("cannot launch: {e}")))?;
    if !output.success() {
        let reason = match output.code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_owned(),
        };
        return Err(Error::external_tool(program, reason));
    }
    Ok(output.stdout)
}
