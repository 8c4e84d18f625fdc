use std::{
    ffi::OsStr,
    io,
    process::{Command, ExitStatus, Output, Stdio},
};

/// How bridges start external tools.
pub trait Runner {
    /// Interactive handoff: the child gets this process's stdin, stdout and
    /// stderr, and the call blocks until it exits.
    fn handoff(&mut self, cmd: &mut Command) -> io::Result<ExitStatus>;

    /// Runs the child to completion and collects what it printed.
    ///
    /// Streams the caller configured explicitly on `cmd` are left as they are.
    fn output(&mut self, cmd: &mut Command) -> io::Result<Output>;
}

impl<T: Runner + ?Sized> Runner for &mut T {
    fn handoff(&mut self, cmd: &mut Command) -> io::Result<ExitStatus> {
        (**self).handoff(cmd)
    }

    fn output(&mut self, cmd: &mut Command) -> io::Result<Output> {
        (**self).output(cmd)
    }
}

/// Spawns real processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn handoff(&mut self, cmd: &mut Command) -> io::Result<ExitStatus> {
        tracing::debug!(command = %describe(cmd), "handing terminal to child");
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?
            .wait()
    }

    fn output(&mut self, cmd: &mut Command) -> io::Result<Output> {
        tracing::debug!(command = %describe(cmd), "running child");
        cmd.output()
    }
}

/// Renders a command line for logs and error messages.
pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}
