use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
  // address the proxy accepts clients on
  pub listen_addr: SocketAddr,

  // the fixed upstream file server, dialed once per command
  pub backend_addr: SocketAddr,

  // backend-leg deadline; None reproduces the reference's unbounded blocking
  pub io_timeout: Option<Duration>,
}
