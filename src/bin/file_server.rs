use std::net::SocketAddr;
use std::path::PathBuf;
use structopt::StructOpt;

use nat_relay::error::Result;
use nat_relay::fileserver::FileServer;

#[derive(StructOpt, Debug)]
#[structopt(about = "Line-oriented file server backend for the NAT relay proxy")]
struct Opts {
  /// Address to listen on
  #[structopt(short, long, default_value = "127.0.0.1:9001")]
  listen: SocketAddr,

  /// Directory served to clients (created if missing)
  #[structopt(short, long, default_value = "files", parse(from_os_str))]
  files_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
  env_logger::init();
  let opts = Opts::from_args();

  let server = FileServer::setup(opts.listen, opts.files_dir).await?;
  server.start().await
}
