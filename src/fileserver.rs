// backend collaborator: a minimal file server speaking the same line
// protocol the proxy relays (one command per connection)
use futures::StreamExt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

use crate::error::Result;
use crate::proto;
use crate::transport;

pub struct FileServer {
  listener: TcpListener,
  files_dir: PathBuf,
}

impl FileServer {
  pub async fn setup(listen_addr: SocketAddr, files_dir: PathBuf) -> Result<Self> {
    fs::create_dir_all(&files_dir).await?;
    let listener = TcpListener::bind(listen_addr).await?;

    Ok(FileServer {
      listener,
      files_dir,
    })
  }

  pub fn local_addr(&self) -> Result<SocketAddr> {
    Ok(self.listener.local_addr()?)
  }

  pub async fn start(mut self) -> Result<()> {
    info!(
      "file server listening on {}, serving files from {}",
      self.listener.local_addr()?,
      self.files_dir.display()
    );

    loop {
      let (socket, peer_addr) = self.listener.accept().await?;
      let files_dir = self.files_dir.clone();

      tokio::spawn(async move {
        if let Err(e) = handle_request(socket, files_dir).await {
          warn!("request from {} failed: {}", peer_addr, e);
        }
      });
    }
  }
}

async fn handle_request(socket: TcpStream, files_dir: PathBuf) -> Result<()> {
  let (read_half, mut writer) = socket.into_split();
  let mut reader = BufReader::new(read_half);

  let line = match transport::read_line(&mut reader).await? {
    Some(line) => line,
    None => return Ok(()),
  };
  let line = line.trim();

  let mut parts = line.splitn(2, char::is_whitespace);
  let verb = parts.next().unwrap_or("").to_ascii_uppercase();
  let argument = parts.next().map(str::trim_start);

  match (verb.as_str(), argument) {
    (proto::LIST, _) => send_listing(&mut writer, &files_dir).await,
    (proto::DOWNLOAD, Some(name)) if !name.is_empty() => {
      send_file(&mut writer, &files_dir, name).await
    }
    _ => transport::send_line(&mut writer, "ERR unknown command").await,
  }
}

async fn send_listing<W>(writer: &mut W, files_dir: &Path) -> Result<()>
where
  W: AsyncWrite + Unpin,
{
  let mut entries = fs::read_dir(files_dir).await?;
  let mut names = Vec::new();
  while let Some(entry) = entries.next().await {
    let entry = entry?;
    if entry.file_type().await?.is_file() {
      names.push(entry.file_name().to_string_lossy().into_owned());
    }
  }
  // directory iteration order is filesystem-dependent; sort for a stable
  // listing
  names.sort();

  transport::send_line(writer, proto::OK).await?;
  for name in &names {
    transport::send_line(writer, name).await?;
  }
  transport::send_line(writer, proto::END_MARKER).await
}

async fn send_file(
  writer: &mut OwnedWriteHalf,
  files_dir: &Path,
  name: &str,
) -> Result<()> {
  // requests may only name entries directly inside the served directory
  if name.contains('/') || name.contains('\\') {
    return transport::send_line(writer, "ERR file not found").await;
  }

  let path = files_dir.join(name);
  let meta = match fs::metadata(&path).await {
    Ok(meta) if meta.is_file() => meta,
    _ => return transport::send_line(writer, "ERR file not found").await,
  };

  transport::send_line(writer, &format!("OK {}", meta.len())).await?;
  let mut file = fs::File::open(&path).await?;
  tokio::io::copy(&mut file, writer).await?;
  Ok(())
}
