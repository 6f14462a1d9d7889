use crate::config::Config;

use std::net::SocketAddr;
use std::time::Duration;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(about = "NAT/PAT relay proxy for a line-oriented file service")]
pub struct CliConfig {
  /// Address the proxy listens on
  #[structopt(short, long, default_value = "0.0.0.0:9000")]
  listen: SocketAddr,

  /// Address of the upstream file server
  #[structopt(short, long, default_value = "127.0.0.1:9001")]
  backend: SocketAddr,

  /// Deadline in seconds for each backend-leg operation
  ///
  /// Applies to the dial and to every read from the file server. When
  /// omitted a stalled backend blocks its session indefinitely.
  #[structopt(short, long)]
  timeout_secs: Option<u64>,
}

impl Into<Config> for CliConfig {
  fn into(self) -> Config {
    Config {
      listen_addr: self.listen,
      backend_addr: self.backend,
      io_timeout: self.timeout_secs.map(Duration::from_secs),
    }
  }
}
