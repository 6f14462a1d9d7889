#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fileserver;
pub mod nat;
pub mod proto;
pub mod relay;
pub mod transport;
