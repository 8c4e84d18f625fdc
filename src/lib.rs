mod agent;
mod app;
mod backup;
mod config;
mod connection;
mod connector;
mod error;
mod input;
mod keys;
mod runner;
mod store;
mod terminal;
mod view;

pub use agent::{ensure_agent, parse_agent_output, register_key, AgentEnv};
pub use app::{App, Choice};
pub use backup::{archive_name, backup, list_backups, restore};
pub use config::Config;
pub use connection::{Connection, DEFAULT_PORT};
pub use connector::{connect, open_session, prepare, resolve};
pub use error::{Error, Result, Tool};
pub use keys::{ensure_key_pair, install_public_key, KeyGenMode, KeyOutcome};
pub use runner::{Runner, SystemRunner};
pub use store::{FlatFileStore, Store};
pub use view::{columns_for, render_row, write_grid};
