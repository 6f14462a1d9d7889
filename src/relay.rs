// this module implements the NAT/PAT relay proxy
use bytes::BytesMut;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use crate::config::Config;
use crate::error::{ConnectError, Result, TransportError};
use crate::nat::{ClientHandle, NatTable};
use crate::proto::{self, ResponseShape, Verb};
use crate::transport;

const RELAY_CHUNK: usize = 4096;

pub struct Proxy {
  listener: TcpListener,
  backend_addr: SocketAddr,
  io_timeout: Option<Duration>,
  nat_table: NatTable,
}

impl Proxy {
  pub async fn setup(conf: &Config, nat_table: &NatTable) -> Result<Self> {
    let listener = TcpListener::bind(conf.listen_addr).await?;
    let nat_table = nat_table.clone();

    Ok(Proxy {
      listener,
      backend_addr: conf.backend_addr,
      io_timeout: conf.io_timeout,
      nat_table,
    })
  }

  pub fn local_addr(&self) -> Result<SocketAddr> {
    Ok(self.listener.local_addr()?)
  }

  pub async fn start(mut self) -> Result<()> {
    info!("proxy listening on {}", self.listener.local_addr()?);
    info!("forwarding to file server at {}", self.backend_addr);

    loop {
      let (socket, client_addr) = self.listener.accept().await?;
      let session = Session::new(
        socket,
        client_addr,
        self.backend_addr,
        self.io_timeout,
        self.nat_table.clone(),
      );

      tokio::spawn(async move {
        if let Err(e) = session.run().await {
          warn!("session {} ended with error: {}", client_addr, e);
        }
      });
    }
  }
}

// One session per accepted client connection; commands are processed
// strictly sequentially within it.
struct Session {
  reader: BufReader<OwnedReadHalf>,
  client: ClientHandle,
  client_addr: SocketAddr,
  backend_addr: SocketAddr,
  io_timeout: Option<Duration>,
  nat_table: NatTable,
}

impl Session {
  fn new(
    socket: TcpStream,
    client_addr: SocketAddr,
    backend_addr: SocketAddr,
    io_timeout: Option<Duration>,
    nat_table: NatTable,
  ) -> Self {
    let (read_half, write_half) = socket.into_split();
    Session {
      reader: BufReader::new(read_half),
      client: ClientHandle::new(write_half),
      client_addr,
      backend_addr,
      io_timeout,
      nat_table,
    }
  }

  async fn run(mut self) -> Result<()> {
    let result = self.serve().await;
    // guarantees no stale entry outlives this session, whatever happened
    // inside a command
    self.nat_table.remove_by_client(self.client_addr).await;
    debug!("session {} closed", self.client_addr);
    result
  }

  async fn serve(&mut self) -> Result<()> {
    // a failure reading the client leg is fatal to this session only
    while let Some(line) = transport::read_line(&mut self.reader).await? {
      let line = line.trim().to_owned();
      if line.is_empty() {
        continue;
      }
      self.handle_command(&line).await;
    }
    Ok(())
  }

  // One command, attempted exactly once. Errors from any phase are folded
  // into a single ERR line: through the NAT table if an upstream port was
  // already registered, directly on the client connection otherwise (the
  // dial-failure case, where no entry exists yet).
  async fn handle_command(&mut self, line: &str) {
    let mut nat_port = None;
    if let Err(err) = self.relay(line, &mut nat_port).await {
      let message = format!("proxy error: {}", err);
      let delivered = match nat_port {
        Some(port) => self.nat_table.send_err(port, &message).await,
        None => self.client.send_line(&format!("ERR {}", message)).await,
      };
      if let Err(e) = delivered {
        debug!("could not report error to {}: {}", self.client_addr, e);
      }
    }
    if let Some(port) = nat_port {
      self.nat_table.remove(port).await;
    }
  }

  async fn relay(&mut self, line: &str, nat_port: &mut Option<u16>) -> Result<()> {
    let verb = Verb::sniff(line);

    let dial = async {
      TcpStream::connect(self.backend_addr)
        .await
        .map_err(ConnectError)
    };
    let backend = self.with_deadline("dial", dial).await?;
    let port = backend.local_addr()?.port();

    // register before anything is sent upstream, so the backend cannot
    // answer a port the table does not know yet
    self
      .nat_table
      .register(port, self.client.clone(), self.client_addr)
      .await;
    *nat_port = Some(port);
    info!(
      "NAT: {} -> :{} -> {} | cmd={}",
      self.client_addr, port, self.backend_addr, line
    );

    let (read_half, mut write_half) = backend.into_split();
    let mut backend_reader = BufReader::new(read_half);
    transport::send_line(&mut write_half, line).await?;

    self.forward_response(&mut backend_reader, port, verb).await
  }

  async fn forward_response<R>(
    &self,
    backend: &mut R,
    port: u16,
    verb: Verb,
  ) -> Result<()>
  where
    R: AsyncBufRead + Unpin,
  {
    let header = match self
      .with_deadline("response header", transport::read_line(backend))
      .await?
    {
      Some(header) if !header.is_empty() => header,
      // EOF and a bare newline both count as no response at all
      _ => {
        self
          .nat_table
          .send_err(port, "empty response from server")
          .await?;
        return Ok(());
      }
    };

    // the header is relayed before it is interpreted; the proxy stays
    // transparent even for responses it cannot make sense of
    self.nat_table.send_line(port, &header).await?;

    match proto::response_shape(verb, &header) {
      Ok(ResponseShape::Sized(size)) => {
        self.relay_bytes(backend, port, size).await
      }
      Ok(ResponseShape::LinesUntilEnd) => {
        self.relay_until_end(backend, port).await
      }
      Ok(ResponseShape::HeaderOnly) => Ok(()),
      Err(_) => {
        self
          .nat_table
          .send_err(port, "invalid size from server")
          .await?;
        Ok(())
      }
    }
  }

  // DOWNLOAD leg: copy exactly `size` bytes in bounded chunks. A backend
  // close before `size` bytes arrived ends the relay silently; the client
  // sees a short body under an unchanged header.
  async fn relay_bytes<R>(&self, backend: &mut R, port: u16, size: u64) -> Result<()>
  where
    R: AsyncRead + Unpin,
  {
    let mut buf = BytesMut::new();
    buf.resize(RELAY_CHUNK, 0);

    let mut remaining = size;
    while remaining > 0 {
      let want = remaining.min(RELAY_CHUNK as u64) as usize;
      let n = self
        .with_deadline("download relay", backend.read(&mut buf[..want]))
        .await?;
      if n == 0 {
        break;
      }
      remaining -= n as u64;
      self.nat_table.send_raw(port, &buf[..n]).await?;
    }
    Ok(())
  }

  // LIST leg: relay lines verbatim up to and including the END marker; an
  // EOF before END just means there is nothing more to relay.
  async fn relay_until_end<R>(&self, backend: &mut R, port: u16) -> Result<()>
  where
    R: AsyncBufRead + Unpin,
  {
    loop {
      let line = match self
        .with_deadline("list relay", transport::read_line(backend))
        .await?
      {
        Some(line) => line,
        None => break,
      };
      self.nat_table.send_line(port, &line).await?;
      if line == proto::END_MARKER {
        break;
      }
    }
    Ok(())
  }

  // Backend-leg deadline. With no timeout configured this is a plain await,
  // matching the reference behavior of blocking indefinitely on a stalled
  // backend.
  async fn with_deadline<T, E, F>(&self, what: &'static str, fut: F) -> Result<T>
  where
    F: Future<Output = std::result::Result<T, E>>,
    failure::Error: From<E>,
  {
    match self.io_timeout {
      None => Ok(fut.await?),
      Some(limit) => match time::timeout(limit, fut).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(
          TransportError(format!("backend {} timed out after {:?}", what, limit))
            .into(),
        ),
      },
    }
  }
}
