use std::{
    ffi::OsString,
    io::{self, Write},
    path::Path,
    process::{Command, Stdio},
};

use crate::config::non_empty;
use crate::error::{Error, Result, Tool};
use crate::runner::Runner;

pub const AUTH_SOCK_VAR: &str = "SSH_AUTH_SOCK";
pub const AGENT_PID_VAR: &str = "SSH_AGENT_PID";

/// Where a running key agent can be reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentEnv {
    pub auth_sock: OsString,
    pub pid: Option<OsString>,
}

impl AgentEnv {
    /// Returns `None` when no socket is set.
    pub fn from_vars(auth_sock: Option<OsString>, pid: Option<OsString>) -> Option<Self> {
        non_empty(auth_sock).map(|auth_sock| Self {
            auth_sock,
            pid: non_empty(pid),
        })
    }

    /// Exposes the agent to a child process.
    pub fn apply(&self, cmd: &mut Command) {
        cmd.env(AUTH_SOCK_VAR, &self.auth_sock);
        if let Some(pid) = &self.pid {
            cmd.env(AGENT_PID_VAR, pid);
        }
    }
}

/// Returns the known agent, or starts `ssh-agent -s` and reads its socket from
/// the shell snippet it prints.
pub fn ensure_agent(runner: &mut impl Runner, existing: Option<&AgentEnv>) -> Result<AgentEnv> {
    if let Some(env) = existing {
        return Ok(env.clone());
    }

    let mut cmd = Command::new(Tool::Agent.program());
    cmd.arg("-s");
    let output = runner
        .output(&mut cmd)
        .map_err(|e| Error::tool(Tool::Agent, format!("failed to start: {e}")))?;
    if !output.status.success() {
        return Err(Error::tool(
            Tool::Agent,
            format!("exited with {}", output.status),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let env = parse_agent_output(&stdout)
        .ok_or_else(|| Error::tool(Tool::Agent, format!("no {AUTH_SOCK_VAR} in output")))?;
    tracing::debug!(sock = ?env.auth_sock, "started ssh-agent");
    Ok(env)
}

/// Scans `VAR=value; export VAR;` lines as printed by `ssh-agent -s`.
pub fn parse_agent_output(output: &str) -> Option<AgentEnv> {
    let auth_sock = find_assignment(output, AUTH_SOCK_VAR)?;
    let pid = find_assignment(output, AGENT_PID_VAR);
    AgentEnv::from_vars(Some(auth_sock.into()), pid.map(Into::into))
}

fn find_assignment(output: &str, var: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains(var))
        .flat_map(|line| line.split(';'))
        .filter(|part| part.contains(var))
        .filter_map(|part| {
            let kv: Vec<&str> = part.split('=').collect();
            match kv.as_slice() {
                [key, value] if key.trim() == var => Some(value.trim().to_string()),
                _ => None,
            }
        })
        .last()
}

/// Adds the private key to the agent. A key the agent already holds counts as
/// success.
pub fn register_key(runner: &mut impl Runner, env: &AgentEnv, key: &Path) -> Result<()> {
    add_key(runner, env, key, &mut io::stderr())
}

/// `register_key` with the captured `ssh-add` stderr echoed to `echo`.
fn add_key(
    runner: &mut impl Runner,
    env: &AgentEnv,
    key: &Path,
    echo: &mut impl Write,
) -> Result<()> {
    let mut cmd = Command::new(Tool::KeyAdd.program());
    cmd.arg(key).stdin(Stdio::inherit()).stdout(Stdio::inherit());
    env.apply(&mut cmd);

    let output = runner
        .output(&mut cmd)
        .map_err(|e| Error::tool(Tool::KeyAdd, e.to_string()))?;

    // stderr was captured to inspect it; the operator still gets to see it
    echo.write_all(&output.stderr)?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("already") {
        tracing::debug!("key already registered with agent");
        return Ok(());
    }

    Err(Error::tool(
        Tool::KeyAdd,
        match stderr.trim() {
            "" => format!("exited with {}", output.status),
            reason => reason.to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;

    const AGENT_OUTPUT: &str = "SSH_AUTH_SOCK=/tmp/ssh-XXXXabcd/agent.4242; export SSH_AUTH_SOCK;\n\
                                SSH_AGENT_PID=4243; export SSH_AGENT_PID;\n\
                                echo Agent pid 4243;\n";

    fn env() -> AgentEnv {
        AgentEnv::from_vars(Some("/tmp/agent.sock".into()), None).unwrap()
    }

    #[test]
    fn parses_socket_and_pid() {
        let env = parse_agent_output(AGENT_OUTPUT).unwrap();
        assert_eq!(env.auth_sock, OsString::from("/tmp/ssh-XXXXabcd/agent.4242"));
        assert_eq!(env.pid, Some(OsString::from("4243")));
    }

    #[test]
    fn output_without_socket_is_rejected() {
        assert_eq!(parse_agent_output("echo Agent pid 4243;\n"), None);
        assert_eq!(parse_agent_output("SSH_AUTH_SOCK=; export SSH_AUTH_SOCK;"), None);
    }

    #[test]
    fn empty_variable_means_no_agent() {
        assert_eq!(AgentEnv::from_vars(Some("".into()), Some("1".into())), None);
        assert_eq!(AgentEnv::from_vars(None, None), None);
    }

    #[test]
    fn known_agent_is_reused_without_spawning() {
        let mut runner = FakeRunner::default();
        let got = ensure_agent(&mut runner, Some(&env())).unwrap();
        assert_eq!(got, env());
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn starts_agent_when_unset() {
        let mut runner = FakeRunner::default();
        runner.reply(0, AGENT_OUTPUT, "");
        let got = ensure_agent(&mut runner, None).unwrap();
        assert_eq!(runner.calls[0].argv(), ["ssh-agent", "-s"]);
        assert!(!runner.calls[0].interactive);
        assert_eq!(got.pid, Some(OsString::from("4243")));
    }

    #[test]
    fn agent_failures_are_agent_errors() {
        let mut runner = FakeRunner::default();
        runner.reply_spawn_error();
        let err = ensure_agent(&mut runner, None).unwrap_err();
        assert!(matches!(err, Error::Tool { tool: Tool::Agent, .. }));

        runner.reply(0, "garbage", "");
        let err = ensure_agent(&mut runner, None).unwrap_err();
        assert!(matches!(err, Error::Tool { tool: Tool::Agent, .. }));
    }

    #[test]
    fn register_key_passes_socket() {
        let mut runner = FakeRunner::default();
        register_key(&mut runner, &env(), Path::new("/home/a/.ssh/id_rsa")).unwrap();
        let call = &runner.calls[0];
        assert_eq!(call.argv(), ["ssh-add", "/home/a/.ssh/id_rsa"]);
        assert_eq!(call.env(AUTH_SOCK_VAR), Some("/tmp/agent.sock"));
        assert_eq!(call.env(AGENT_PID_VAR), None);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn agent_messages_are_echoed() {
        let mut runner = FakeRunner::default();
        runner.reply(0, "", "Identity added: id_rsa\n");
        let mut echo = Vec::new();
        add_key(&mut runner, &env(), Path::new("id_rsa"), &mut echo).unwrap();
        assert_eq!(echo, b"Identity added: id_rsa\n");

        runner.reply(0, "", "Identity added: id_rsa\n");
        let err = add_key(&mut runner, &env(), Path::new("id_rsa"), &mut ClosedPipe).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn already_added_counts_as_success() {
        let mut runner = FakeRunner::default();
        runner.reply(1, "", "Identity already added\n");
        assert!(register_key(&mut runner, &env(), Path::new("id_rsa")).is_ok());

        runner.reply(1, "", "Could not open a connection to your authentication agent.\n");
        let err = register_key(&mut runner, &env(), Path::new("id_rsa")).unwrap_err();
        assert!(matches!(err, Error::Tool { tool: Tool::KeyAdd, .. }));
    }
}
