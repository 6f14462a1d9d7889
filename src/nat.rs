use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::transport;

// Shared write handle to a client connection. The relay session keeps one
// clone for its direct error path; the NAT table indexes further clones but
// never owns the connection.
#[derive(Clone)]
pub struct ClientHandle(Arc<Mutex<OwnedWriteHalf>>);

impl ClientHandle {
  pub fn new(writer: OwnedWriteHalf) -> Self {
    ClientHandle(Arc::new(Mutex::new(writer)))
  }

  pub async fn send_line(&self, line: &str) -> Result<()> {
    transport::send_line(&mut *self.0.lock().await, line).await
  }

  pub async fn send_raw(&self, bytes: &[u8]) -> Result<()> {
    transport::send_raw(&mut *self.0.lock().await, bytes).await
  }
}

#[derive(Clone)]
pub struct NatEntry {
  pub client: ClientHandle,
  pub client_addr: SocketAddr,
}

// map from the ephemeral local port of an upstream connection back to the
// client it was dialed for; the only channel through which relayed data
// reaches a client
#[derive(Clone)]
pub struct NatTable(Arc<Mutex<HashMap<u16, NatEntry>>>);

impl NatTable {
  pub fn new() -> Self {
    let map = Arc::new(Mutex::new(HashMap::new()));
    NatTable(map)
  }

  // insert or overwrite; ephemeral ports are not expected to collide, but a
  // collision must not crash — last writer wins
  pub async fn register(
    &self,
    port: u16,
    client: ClientHandle,
    client_addr: SocketAddr,
  ) {
    let entry = NatEntry {
      client,
      client_addr,
    };
    self.0.lock().await.insert(port, entry);
  }

  pub async fn lookup(&self, port: u16) -> Option<NatEntry> {
    self.0.lock().await.get(&port).cloned()
  }

  pub async fn len(&self) -> usize {
    self.0.lock().await.len()
  }

  // idempotent
  pub async fn remove(&self, port: u16) {
    self.0.lock().await.remove(&port);
  }

  // session-teardown sweep: drops every entry owned by the given client so
  // nothing outlives its session even when a command's own cleanup was
  // skipped by a fault
  pub async fn remove_by_client(&self, client_addr: SocketAddr) {
    self
      .0
      .lock()
      .await
      .retain(|_, entry| entry.client_addr != client_addr);
  }

  // The send helpers clone the entry under the table lock and write outside
  // it, so a slow client never stalls table operations for other sessions.
  // Sending to an absent port is a no-op.
  pub async fn send_line(&self, port: u16, line: &str) -> Result<()> {
    match self.lookup(port).await {
      Some(entry) => entry.client.send_line(line).await,
      None => Ok(()),
    }
  }

  pub async fn send_raw(&self, port: u16, bytes: &[u8]) -> Result<()> {
    match self.lookup(port).await {
      Some(entry) => entry.client.send_raw(bytes).await,
      None => Ok(()),
    }
  }

  pub async fn send_err(&self, port: u16, message: &str) -> Result<()> {
    self.send_line(port, &format!("ERR {}", message)).await
  }
}
