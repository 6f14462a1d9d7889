use std::io::Write as _;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};

use nat_relay::client::Client;
use nat_relay::error::Result;

#[derive(StructOpt, Debug)]
#[structopt(about = "Client for the NAT relay proxy")]
struct Opts {
  /// Proxy address to connect to
  #[structopt(short, long, default_value = "127.0.0.1:9000")]
  proxy: SocketAddr,

  #[structopt(subcommand)]
  command: Option<Command>,
}

#[derive(StructOpt, Debug)]
enum Command {
  /// Run a single list command before entering the prompt
  List,
  /// Run a single download command before entering the prompt
  Download {
    /// Name of the file to download
    filename: String,

    /// Destination path (defaults to the file name in the current directory)
    #[structopt(long, parse(from_os_str))]
    out: Option<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  env_logger::init();
  let opts = Opts::from_args();

  let mut client = Client::connect(opts.proxy).await?;
  println!("Connected to proxy at {}", opts.proxy);

  match opts.command {
    Some(Command::List) => run_list(&mut client).await?,
    Some(Command::Download { filename, out }) => {
      let dest = out.unwrap_or_else(|| PathBuf::from(&filename));
      run_download(&mut client, &filename, &dest).await?;
    }
    None => {}
  }

  interactive_loop(&mut client).await
}

async fn run_list(client: &mut Client) -> Result<()> {
  let files = client.list().await?;
  println!("Files on server:");
  for name in files {
    println!("- {}", name);
  }
  Ok(())
}

async fn run_download(
  client: &mut Client,
  filename: &str,
  dest: &Path,
) -> Result<()> {
  let contents = client.download(filename).await?;
  if let Some(parent) = dest.parent() {
    if !parent.as_os_str().is_empty() {
      tokio::fs::create_dir_all(parent).await?;
    }
  }
  tokio::fs::write(dest, contents).await?;
  println!("Downloaded to {}", dest.display());
  Ok(())
}

async fn interactive_loop(client: &mut Client) -> Result<()> {
  println!("Enter commands: \"list\", \"download <filename> [dest]\", or \"exit\".");
  let mut lines = BufReader::new(tokio::io::stdin()).lines();

  loop {
    print!("proxy> ");
    std::io::stdout().flush()?;

    let raw = match lines.next_line().await? {
      Some(line) => line,
      None => break,
    };
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.is_empty() {
      continue;
    }

    let command = parts[0].to_lowercase();
    let result = match (command.as_str(), &parts[1..]) {
      ("exit", _) | ("quit", _) => break,
      ("list", _) => run_list(client).await,
      ("download", [filename]) => {
        run_download(client, filename, Path::new(filename)).await
      }
      ("download", [filename, dest]) => {
        run_download(client, filename, Path::new(dest)).await
      }
      _ => {
        println!("Unknown command. Use \"list\", \"download <filename>\", or \"exit\".");
        continue;
      }
    };
    if let Err(e) = result {
      println!("Command failed: {}", e);
    }
  }
  Ok(())
}
