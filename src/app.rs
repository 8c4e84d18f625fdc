use std::io::{BufRead, Write};

use chrono::Local;

use crate::agent::AgentEnv;
use crate::backup;
use crate::config::Config;
use crate::connection::Connection;
use crate::connector;
use crate::error::{Error, Result, Tool};
use crate::input::Console;
use crate::keys::{self, KeyGenMode, KeyOutcome};
use crate::runner::Runner;
use crate::store::Store;
use crate::terminal;
use crate::view;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Help,
    Add,
    Connect,
    Delete,
    List,
    SetupKey,
    Backup,
    Restore,
    Exit,
}

impl Choice {
    pub fn parse(input: &str) -> Option<Self> {
        let choice = match input.trim() {
            "?" | "help" => Choice::Help,
            "1" => Choice::Add,
            "2" => Choice::Connect,
            "3" => Choice::Delete,
            "4" => Choice::List,
            "5" => Choice::SetupKey,
            "6" => Choice::Backup,
            "7" => Choice::Restore,
            "8" => Choice::Exit,
            _ => return None,
        };
        Some(choice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    AwaitingChoice,
    Dispatch(Option<Choice>),
    AwaitingAck,
    ClearScreen,
    Exited,
}

/// The interactive menu over the store and the external tools.
pub struct App<S, P, R, W> {
    config: Config,
    store: S,
    runner: P,
    console: Console<R, W>,
    agent: Option<AgentEnv>,
    term_width: fn() -> Option<u16>,
}

impl<S, P, R, W> App<S, P, R, W>
where
    S: Store,
    P: Runner,
    R: BufRead,
    W: Write,
{
    pub fn new(config: Config, store: S, runner: P, input: R, out: W) -> Self {
        Self {
            agent: config.agent.clone(),
            config,
            store,
            runner,
            console: Console::new(input, out),
            term_width: terminal::width,
        }
    }

    pub fn with_term_width(mut self, term_width: fn() -> Option<u16>) -> Self {
        self.term_width = term_width;
        self
    }

    /// Runs until the operator picks exit or input ends.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut state = State::Idle;
        loop {
            state = match state {
                State::Idle => {
                    self.main_menu()?;
                    State::AwaitingChoice
                }
                State::AwaitingChoice => match self.console.prompt("Choice: ")? {
                    Some(input) => {
                        writeln!(self.console.out)?;
                        State::Dispatch(Choice::parse(&input))
                    }
                    None => State::Exited,
                },
                State::Dispatch(Some(Choice::Exit)) => {
                    view::header(
                        &mut self.console.out,
                        "Thank you for using SSH Connection Manager",
                    )?;
                    State::Exited
                }
                State::Dispatch(choice) => {
                    tracing::debug!(?choice, "dispatch");
                    self.dispatch(choice)?;
                    State::AwaitingAck
                }
                State::AwaitingAck => match self.console.prompt("\nPress Enter to continue...")? {
                    Some(_) => State::ClearScreen,
                    None => State::Exited,
                },
                State::ClearScreen => {
                    terminal::clear_screen(&mut self.console.out)?;
                    writeln!(self.console.out)?;
                    State::Idle
                }
                State::Exited => return Ok(()),
            };
        }
    }

    fn main_menu(&mut self) -> Result<()> {
        self.list_connections()?;
        view::info(&mut self.console.out, "Type '?' or 'help' for options")?;
        Ok(())
    }

    fn dispatch(&mut self, choice: Option<Choice>) -> Result<()> {
        match choice {
            Some(Choice::Help) => view::help(&mut self.console.out)?,
            Some(Choice::Add) => self.add_connection()?,
            Some(Choice::Connect) => self.connect_to_server()?,
            Some(Choice::Delete) => self.delete_connection()?,
            Some(Choice::List) => self.list_connections()?,
            Some(Choice::SetupKey) => self.setup_key()?,
            Some(Choice::Backup) => self.backup_config()?,
            Some(Choice::Restore) => self.restore_config()?,
            Some(Choice::Exit) => {}
            None => view::error(&mut self.console.out, "Invalid choice, type '?' for help")?,
        }
        Ok(())
    }

    fn list_connections(&mut self) -> Result<()> {
        view::banner(&mut self.console.out)?;

        let conns = match self.store.load() {
            Ok(conns) => conns,
            Err(e) => return self.fail("Failed to read config file", e),
        };
        if conns.is_empty() {
            return view::info(&mut self.console.out, "No connections yet").map_err(Into::into);
        }

        let width = match (self.term_width)() {
            Some(width) => width,
            None => {
                tracing::warn!(fallback = terminal::FALLBACK_WIDTH, "terminal width unknown");
                view::warning(
                    &mut self.console.out,
                    "Using default terminal width due to size detection error",
                )?;
                terminal::FALLBACK_WIDTH
            }
        };

        view::write_grid(&mut self.console.out, &conns, view::columns_for(width))?;
        Ok(())
    }

    fn add_connection(&mut self) -> Result<()> {
        view::info(&mut self.console.out, "Add a new SSH connection:")?;

        let Some(name) = self.console.prompt("Connection Name: ")? else {
            return Ok(());
        };
        if name.is_empty() {
            return self.rejected("Name cannot be empty");
        }
        let Some(user) = self.console.prompt("Username: ")? else {
            return Ok(());
        };
        if user.is_empty() {
            return self.rejected("Username cannot be empty");
        }
        let Some(host) = self.console.prompt("Host (IP or domain): ")? else {
            return Ok(());
        };
        if host.is_empty() {
            return self.rejected("Host cannot be empty");
        }
        let Some(port) = self.console.prompt("Port (default 22): ")? else {
            return Ok(());
        };

        let conn = match Connection::new(&name, &user, &host, &port) {
            Ok(conn) => conn,
            Err(Error::Validation(msg)) => return self.rejected(&msg),
            Err(e) => return Err(e),
        };
        if let Err(e) = self.store.append(&conn) {
            return self.fail("Failed to save connection", e);
        }
        view::success(&mut self.console.out, "Connection added successfully")?;

        if self.console.confirm("Setup SSH key now? (y/n): ")? {
            self.install_key_for(&conn)?;
        }
        Ok(())
    }

    fn install_key_for(&mut self, conn: &Connection) -> Result<()> {
        if !self.config.private_key.exists() {
            view::info(&mut self.console.out, "Generating new SSH key...")?;
        }
        let generated = keys::ensure_key_pair(
            &mut self.runner,
            &self.config.private_key,
            KeyGenMode::Unattended,
            false,
        );
        if let Err(e) = generated {
            return self.fail("Failed to generate SSH key", e);
        }

        view::info(
            &mut self.console.out,
            &format!("Copying key to {}...", conn.host),
        )?;
        let installed = keys::install_public_key(
            &mut self.runner,
            &self.config.private_key,
            &conn.user,
            &conn.host,
            &conn.port,
        );
        if let Err(e) = installed {
            return self.fail("Failed to copy SSH key to host", e);
        }
        view::success(&mut self.console.out, "SSH key setup completed")?;
        Ok(())
    }

    fn connect_to_server(&mut self) -> Result<()> {
        let conns = match self.store.load() {
            Ok(conns) => conns,
            Err(e) => return self.fail("Failed to read config file", e),
        };
        if conns.is_empty() {
            return view::info(&mut self.console.out, "No connections available")
                .map_err(Into::into);
        }

        view::info(
            &mut self.console.out,
            "Select a server to connect (enter the number):",
        )?;
        view::selection_list(&mut self.console.out, &conns)?;
        let Some(index) = self.read_index()? else {
            return Ok(());
        };

        let prepared = connector::prepare(
            &mut self.runner,
            &conns,
            index,
            &self.config.private_key,
            &mut self.agent,
        );
        let mut cmd = match prepared {
            Ok(cmd) => cmd,
            Err(e @ Error::Index { .. }) => return self.fail("Invalid selection", e),
            Err(
                e @ Error::Tool {
                    tool: Tool::Agent | Tool::KeyAdd,
                    ..
                },
            ) => {
                let msg = format!("Failed to initialize SSH agent: {e}");
                return self.fail(&msg, e);
            }
            Err(e) => return self.fail("Connection failed", e),
        };

        if let Ok(conn) = connector::resolve(&conns, index) {
            view::info(
                &mut self.console.out,
                &format!("Connecting to {}:{}...", conn.target(), conn.port),
            )?;
        }
        if let Err(e) = connector::open_session(&mut self.runner, &mut cmd) {
            return self.fail("Connection failed", e);
        }
        Ok(())
    }

    fn delete_connection(&mut self) -> Result<()> {
        let conns = match self.store.load() {
            Ok(conns) => conns,
            Err(e) => return self.fail("Failed to read config file", e),
        };
        if conns.is_empty() {
            return view::info(&mut self.console.out, "No connections to delete")
                .map_err(Into::into);
        }

        view::info(
            &mut self.console.out,
            "Select a connection to delete (enter the number):",
        )?;
        view::selection_list(&mut self.console.out, &conns)?;
        let Some(index) = self.read_index()? else {
            return Ok(());
        };

        match self.store.delete(index) {
            Ok(_) => {
                view::success(&mut self.console.out, "Connection deleted successfully")?;
                Ok(())
            }
            Err(e @ Error::Index { .. }) => self.fail("Invalid selection", e),
            Err(e) => self.fail("Failed to update config file", e),
        }
    }

    fn setup_key(&mut self) -> Result<()> {
        view::info(&mut self.console.out, "Setting up SSH key...")?;

        let mut overwrite = false;
        if self.config.private_key.exists() {
            view::info(
                &mut self.console.out,
                "SSH key already exists. Do you want to generate a new one? (y/n)",
            )?;
            if !self.console.confirm("")? {
                return Ok(());
            }
            overwrite = true;
        }

        match keys::ensure_key_pair(
            &mut self.runner,
            &self.config.private_key,
            KeyGenMode::Interactive,
            overwrite,
        ) {
            Ok(KeyOutcome::Generated) => {
                view::success(&mut self.console.out, "SSH key generated successfully")?;
                Ok(())
            }
            Ok(KeyOutcome::Kept) => Ok(()),
            Err(e) => self.fail("Failed to generate SSH key", e),
        }
    }

    fn backup_config(&mut self) -> Result<()> {
        let at = Local::now().naive_local();
        let location = self.config.backup_dir.join(backup::archive_name(at));

        view::info(&mut self.console.out, "Creating configuration backup...")?;
        view::info(
            &mut self.console.out,
            &format!("Location: {}", location.display()),
        )?;

        if let Err(e) = backup::backup(&mut self.runner, &self.config, at) {
            return self.fail("Failed to create backup", e);
        }
        view::success(&mut self.console.out, "Backup successful")?;
        writeln!(
            self.console.out,
            "Please move the file to another device for restore"
        )?;
        Ok(())
    }

    fn restore_config(&mut self) -> Result<()> {
        let available = backup::list_backups(&self.config);
        if !available.is_empty() {
            view::info(&mut self.console.out, "Available backups:")?;
            for path in &available {
                writeln!(self.console.out, "  {}", path.display())?;
            }
        }

        view::info(&mut self.console.out, "Enter the path to backup file:")?;
        let Some(raw) = self.console.read_line()? else {
            return Ok(());
        };
        let archive = self.config.expand_path(&raw);

        match backup::restore(&mut self.runner, &self.config, &archive) {
            Ok(()) => {
                view::success(&mut self.console.out, "Configuration restored successfully")?;
                Ok(())
            }
            Err(e @ Error::NotFound(_)) => self.fail("Backup file not found", e),
            Err(e) => self.fail("Failed to restore backup", e),
        }
    }

    /// Reads a selection number; anything unparsable is reported as invalid.
    fn read_index(&mut self) -> Result<Option<usize>> {
        let Some(choice) = self.console.prompt("Choice: ")? else {
            return Ok(None);
        };
        match choice.parse::<usize>() {
            Ok(index) => Ok(Some(index)),
            Err(_) => {
                self.fail(
                    "Invalid selection",
                    Error::validation(format!("not a number: {choice:?}")),
                )?;
                Ok(None)
            }
        }
    }

    fn rejected(&mut self, msg: &str) -> Result<()> {
        view::error(&mut self.console.out, msg)?;
        Ok(())
    }

    /// Reports a failed operation; the menu carries on.
    fn fail(&mut self, msg: &str, err: Error) -> Result<()> {
        tracing::warn!(error = %err, "{msg}");
        view::error(&mut self.console.out, msg)?;
        Ok(())
    }
}
