use std::io;

use anyhow::Context;
use hmpssh::{App, Config, FlatFileStore, SystemRunner};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // RUST_LOG opts in; the menu owns the screen otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("cannot resolve configuration paths")?;
    config
        .init_dirs()
        .with_context(|| format!("cannot prepare {}", config.ssh_dir.display()))?;

    let store = FlatFileStore::open(&config.connections_file);
    let stdin = io::stdin();
    let mut app = App::new(config, store, SystemRunner, stdin.lock(), io::stdout());
    app.run()?;

    Result::Ok(())
}
