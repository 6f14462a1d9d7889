use structopt::StructOpt;

use nat_relay::cli::CliConfig;
use nat_relay::config::Config;
use nat_relay::error::Result;
use nat_relay::nat::NatTable;
use nat_relay::relay::Proxy;

#[tokio::main]
async fn main() -> Result<()> {
  env_logger::init();
  let config: Config = CliConfig::from_args().into();

  let nat_table = NatTable::new();
  let proxy = Proxy::setup(&config, &nat_table).await?;
  proxy.start().await
}
