//! Daemon running one participant of the onion overlay: the registry,
//! a relay, or a destination peer.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

mod config;
mod forward;
mod peer;
mod registry;
mod relay;

use anyhow::Error;
use tokio::runtime;

use crate::config::{cli_parse, NodeConfig, Role};

fn main() -> Result<(), Error> {
    env_logger::init();
    let config = cli_parse();
    let runtime = runtime::Runtime::new()?;
    runtime.block_on(run(config))
}

async fn run(config: NodeConfig) -> Result<(), Error> {
    match config.role {
        Role::Registry => registry::run(config).await,
        Role::Relay { id } => relay::run(config, id).await,
        Role::Peer { id } => peer::run(config, id).await,
    }
}
