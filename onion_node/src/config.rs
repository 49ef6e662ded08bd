//! CLI parsing and address derivation.
//!
//! Every participant listens on a deterministic local port derived from
//! a fixed base plus its integer identity; the derivation lives here,
//! the core only ever sees opaque `HopAddr` values.

use clap::{value_parser, Arg, Command};

use onion_core::peer::AddrBook;
use onion_packet::{HopAddr, NodeId};

/// Default port of the registry.
pub const REGISTRY_PORT: u16 = 8080;
/// Default base port of relays; relay `id` listens on `BASE + id`.
pub const BASE_RELAY_PORT: u32 = 4000;
/// Default base port of peers; peer `id` listens on `BASE + id`.
pub const BASE_PEER_PORT: u32 = 3000;

/// Which participant this process runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Registry,
    Relay { id: NodeId },
    Peer { id: NodeId },
}

/// Runtime configuration of one participant.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Which participant to run.
    pub role: Role,
    /// Port the registry listens on.
    pub registry_port: u16,
    /// Base port of relay addresses.
    pub relay_base_port: u32,
    /// Base port of peer addresses.
    pub peer_base_port: u32,
}

impl NodeConfig {
    /// Base URL of the registry.
    pub fn registry_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.registry_port)
    }

    /// Address the relay with the given id listens on.
    pub fn relay_addr(&self, id: NodeId) -> HopAddr {
        HopAddr(self.relay_base_port + id)
    }

    /// Address the peer with the given id listens on.
    pub fn peer_addr(&self, id: NodeId) -> HopAddr {
        HopAddr(self.peer_base_port + id)
    }
}

impl AddrBook for NodeConfig {
    fn relay_addr(&self, node_id: NodeId) -> HopAddr {
        NodeConfig::relay_addr(self, node_id)
    }
}

/// Parse command line arguments into a `NodeConfig`.
pub fn cli_parse() -> NodeConfig {
    let id_arg = Arg::new("id")
        .long("id")
        .required(true)
        .value_parser(value_parser!(u32))
        .help("Integer identity of this participant");

    let matches = Command::new("onion-node")
        .version(crate_version!())
        .about("Runs one participant of the onion overlay")
        .arg(
            Arg::new("registry-port")
                .long("registry-port")
                .global(true)
                .value_parser(value_parser!(u16))
                .default_value("8080")
                .env("ONION_REGISTRY_PORT")
                .help("Port the registry listens on"),
        )
        .arg(
            Arg::new("relay-base-port")
                .long("relay-base-port")
                .global(true)
                .value_parser(value_parser!(u32))
                .default_value("4000")
                .env("ONION_RELAY_BASE_PORT")
                .help("Base port of relay addresses; relay N listens on BASE + N"),
        )
        .arg(
            Arg::new("peer-base-port")
                .long("peer-base-port")
                .global(true)
                .value_parser(value_parser!(u32))
                .default_value("3000")
                .env("ONION_PEER_BASE_PORT")
                .help("Base port of peer addresses; peer N listens on BASE + N"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("registry").about("Run the node registry"))
        .subcommand(
            Command::new("relay")
                .about("Run an onion relay")
                .arg(id_arg.clone()),
        )
        .subcommand(
            Command::new("peer")
                .about("Run a destination/sender peer")
                .arg(id_arg),
        )
        .get_matches();

    let role = match matches.subcommand() {
        Some(("registry", _)) => Role::Registry,
        Some(("relay", sub_matches)) => Role::Relay {
            id: *sub_matches.get_one::<u32>("id").expect("id is required"),
        },
        Some(("peer", sub_matches)) => Role::Peer {
            id: *sub_matches.get_one::<u32>("id").expect("id is required"),
        },
        _ => unreachable!("subcommand is required"),
    };

    NodeConfig {
        role,
        registry_port: *matches
            .get_one::<u16>("registry-port")
            .expect("registry-port has a default"),
        relay_base_port: *matches
            .get_one::<u32>("relay-base-port")
            .expect("relay-base-port has a default"),
        peer_base_port: *matches
            .get_one::<u32>("peer-base-port")
            .expect("peer-base-port has a default"),
    }
}
