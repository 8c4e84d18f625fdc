use std::{path::Path, process::Command};

use crate::agent::{self, AgentEnv};
use crate::connection::Connection;
use crate::error::{Error, Result, Tool};
use crate::runner::Runner;

/// Picks the connection at `index`, bounds-checked.
pub fn resolve(conns: &[Connection], index: usize) -> Result<&Connection> {
    conns.get(index).ok_or(Error::Index {
        index,
        len: conns.len(),
    })
}

/// Resolves the connection at `index`, ensures the agent holds the key, then
/// hands the terminal to `ssh` until the session ends.
///
/// `agent_env` is filled in as soon as an agent is known, so later connections
/// reuse it even when this one fails.
pub fn connect(
    runner: &mut impl Runner,
    conns: &[Connection],
    index: usize,
    key: &Path,
    agent_env: &mut Option<AgentEnv>,
) -> Result<()> {
    let mut cmd = prepare(runner, conns, index, key, agent_env)?;
    open_session(runner, &mut cmd)
}

/// Everything `connect` does before the handoff: returns the `ssh` command
/// with the agent environment applied.
pub fn prepare(
    runner: &mut impl Runner,
    conns: &[Connection],
    index: usize,
    key: &Path,
    agent_env: &mut Option<AgentEnv>,
) -> Result<Command> {
    let conn = resolve(conns, index)?;
    let env = agent::ensure_agent(runner, agent_env.as_ref())?;
    let env = agent_env.insert(env);
    agent::register_key(runner, env, key)?;

    let mut cmd = ssh_command(conn, key);
    env.apply(&mut cmd);
    tracing::info!(name = %conn.name, target = %conn.target(), port = %conn.port, "connecting");
    Ok(cmd)
}

/// Hands the terminal to a prepared `ssh` command and waits for it.
pub fn open_session(runner: &mut impl Runner, cmd: &mut Command) -> Result<()> {
    let status = runner
        .handoff(cmd)
        .map_err(|e| Error::tool(Tool::RemoteShell, e.to_string()))?;
    if !status.success() {
        return Err(Error::tool(
            Tool::RemoteShell,
            format!("exited with {status}"),
        ));
    }
    Ok(())
}

pub fn ssh_command(conn: &Connection, key: &Path) -> Command {
    let mut cmd = Command::new(Tool::RemoteShell.program());
    cmd.arg("-i")
        .arg(key)
        .args(["-p", conn.port.as_str()])
        .arg(conn.target());
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;

    fn conns() -> Vec<Connection> {
        vec![
            Connection::new("home", "alice", "10.0.0.5", "").unwrap(),
            Connection::new("web", "root", "example.com", "2222").unwrap(),
        ]
    }

    fn agent() -> AgentEnv {
        AgentEnv::from_vars(Some("/tmp/agent.sock".into()), Some("77".into())).unwrap()
    }

    fn known() -> Option<AgentEnv> {
        Some(agent())
    }

    #[test]
    fn resolve_is_bounds_checked() {
        let conns = conns();
        assert_eq!(resolve(&conns, 1).unwrap().name, "web");
        assert!(matches!(
            resolve(&conns, 2),
            Err(Error::Index { index: 2, len: 2 })
        ));
    }

    #[test]
    fn connect_registers_key_then_hands_off() {
        let conns = conns();
        let mut runner = FakeRunner::default();
        let mut env = known();
        connect(&mut runner, &conns, 1, Path::new("/k/id_rsa"), &mut env).unwrap();
        assert_eq!(env, known());

        assert_eq!(runner.programs(), ["ssh-add", "ssh"]);
        let ssh = &runner.calls[1];
        assert_eq!(
            ssh.argv(),
            ["ssh", "-i", "/k/id_rsa", "-p", "2222", "root@example.com"]
        );
        assert!(ssh.interactive);
        assert_eq!(ssh.env("SSH_AUTH_SOCK"), Some("/tmp/agent.sock"));
        assert_eq!(ssh.env("SSH_AGENT_PID"), Some("77"));
    }

    #[test]
    fn connect_starts_agent_when_missing() {
        let conns = conns();
        let mut runner = FakeRunner::default();
        runner.reply(0, "SSH_AUTH_SOCK=/tmp/new.sock; export SSH_AUTH_SOCK;\n", "");

        let mut env = None;
        connect(&mut runner, &conns, 0, Path::new("/k/id_rsa"), &mut env).unwrap();
        assert_eq!(
            env.unwrap().auth_sock,
            std::ffi::OsString::from("/tmp/new.sock")
        );
        assert_eq!(runner.programs(), ["ssh-agent", "ssh-add", "ssh"]);
    }

    #[test]
    fn out_of_range_spawns_nothing() {
        let mut runner = FakeRunner::default();
        let err = connect(&mut runner, &conns(), 5, Path::new("/k/id_rsa"), &mut None).unwrap_err();
        assert!(matches!(err, Error::Index { index: 5, len: 2 }));
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn failed_key_add_stops_before_ssh_but_keeps_agent() {
        let conns = conns();
        let mut runner = FakeRunner::default();
        runner
            .reply(0, "SSH_AUTH_SOCK=/tmp/new.sock; export SSH_AUTH_SOCK;\n", "")
            .reply(1, "", "Error loading key\n");

        let mut env = None;
        let err = connect(&mut runner, &conns, 0, Path::new("/k/id_rsa"), &mut env).unwrap_err();
        assert!(matches!(err, Error::Tool { tool: Tool::KeyAdd, .. }));
        assert_eq!(runner.programs(), ["ssh-agent", "ssh-add"]);
        assert!(env.is_some());
    }

    #[test]
    fn prepare_stops_short_of_ssh() {
        let conns = conns();
        let mut runner = FakeRunner::default();
        let cmd = prepare(&mut runner, &conns, 0, Path::new("/k/id_rsa"), &mut known()).unwrap();
        assert_eq!(runner.programs(), ["ssh-add"]);
        assert_eq!(crate::runner::describe(&cmd), "ssh -i /k/id_rsa -p 22 alice@10.0.0.5");
    }

    #[test]
    fn remote_exit_status_is_propagated() {
        let conns = conns();
        let mut runner = FakeRunner::default();
        runner.reply(0, "", "").reply(255, "", "");

        let err = connect(&mut runner, &conns, 0, Path::new("/k/id_rsa"), &mut known())
            .unwrap_err();
        assert!(matches!(err, Error::Tool { tool: Tool::RemoteShell, .. }));
    }
}
