// client collaborator: speaks the file service protocol through the proxy
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{ProtocolError, Result};
use crate::proto;
use crate::transport;

const RECV_CHUNK: usize = 4096;

pub struct Client {
  reader: BufReader<OwnedReadHalf>,
  writer: OwnedWriteHalf,
}

impl Client {
  pub async fn connect(addr: SocketAddr) -> Result<Self> {
    let socket = TcpStream::connect(addr).await?;
    let (read_half, write_half) = socket.into_split();

    Ok(Client {
      reader: BufReader::new(read_half),
      writer: write_half,
    })
  }

  pub async fn list(&mut self) -> Result<Vec<String>> {
    transport::send_line(&mut self.writer, proto::LIST).await?;

    let header = transport::read_line(&mut self.reader).await?;
    match header.as_deref() {
      Some(h) if h == proto::OK => {}
      other => bail!("unexpected response: {:?}", other),
    }

    let mut files = Vec::new();
    while let Some(line) = transport::read_line(&mut self.reader).await? {
      if line == proto::END_MARKER {
        break;
      }
      files.push(line);
    }
    Ok(files)
  }

  pub async fn download(&mut self, filename: &str) -> Result<Vec<u8>> {
    let command = format!("{} {}", proto::DOWNLOAD, filename);
    transport::send_line(&mut self.writer, &command).await?;

    let header = match transport::read_line(&mut self.reader).await? {
      Some(header) => header,
      None => bail!("connection closed before response"),
    };
    if !header.starts_with("OK ") {
      bail!("unexpected response: {}", header);
    }
    let size = header["OK ".len()..]
      .trim()
      .parse::<usize>()
      .map_err(|_| ProtocolError(format!("invalid size in response {:?}", header)))?;

    let mut contents = Vec::with_capacity(size);
    let mut buf = [0u8; RECV_CHUNK];
    let mut remaining = size;
    while remaining > 0 {
      let want = remaining.min(RECV_CHUNK);
      let n = self.reader.read(&mut buf[..want]).await?;
      if n == 0 {
        break;
      }
      contents.extend_from_slice(&buf[..n]);
      remaining -= n;
    }
    ensure!(remaining == 0, "download incomplete");

    Ok(contents)
  }
}
