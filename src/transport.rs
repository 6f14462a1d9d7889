// newline-terminated line IO shared by the proxy, the file server and the
// client
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

// Reads up to the next '\n' and returns the line without it. None means the
// peer closed before sending a single byte; a partial line followed by EOF
// comes back as a normal line.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<String>>
where
  R: AsyncBufRead + Unpin,
{
  let mut buf = Vec::new();
  let n = reader.read_until(b'\n', &mut buf).await?;
  if n == 0 {
    return Ok(None);
  }
  if buf.last() == Some(&b'\n') {
    buf.pop();
  }
  let line = String::from_utf8(buf)
    .map_err(|e| ProtocolError(format!("non-utf8 line: {}", e)))?;
  Ok(Some(line))
}

// Writes the line plus a terminating '\n' (added if absent) as one framed
// write, so callers holding different connections cannot interleave inside a
// single line.
pub async fn send_line<W>(writer: &mut W, line: &str) -> Result<()>
where
  W: AsyncWrite + Unpin,
{
  let mut framed = String::with_capacity(line.len() + 1);
  framed.push_str(line);
  if !framed.ends_with('\n') {
    framed.push('\n');
  }
  writer.write_all(framed.as_bytes()).await?;
  Ok(())
}

pub async fn send_raw<W>(writer: &mut W, bytes: &[u8]) -> Result<()>
where
  W: AsyncWrite + Unpin,
{
  writer.write_all(bytes).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, BufReader};
  use tokio::net::{TcpListener, TcpStream};

  async fn tcp_pair() -> (TcpStream, TcpStream) {
    let mut listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, server) =
      tokio::join!(TcpStream::connect(addr), listener.accept());
    (client.unwrap(), server.unwrap().0)
  }

  #[tokio::test]
  async fn reads_lines_and_partial_tail() {
    let (mut tx, rx) = tcp_pair().await;
    send_raw(&mut tx, b"hello\nworld").await.unwrap();
    drop(tx);

    let mut reader = BufReader::new(rx);
    assert_eq!(read_line(&mut reader).await.unwrap().as_deref(), Some("hello"));
    // closed mid-line: the partial buffer still comes out as a line
    assert_eq!(read_line(&mut reader).await.unwrap().as_deref(), Some("world"));
    assert_eq!(read_line(&mut reader).await.unwrap(), None);
  }

  #[tokio::test]
  async fn eof_before_any_byte_is_none() {
    let (tx, rx) = tcp_pair().await;
    drop(tx);
    let mut reader = BufReader::new(rx);
    assert_eq!(read_line(&mut reader).await.unwrap(), None);
  }

  #[tokio::test]
  async fn empty_line_is_not_eof() {
    let (mut tx, rx) = tcp_pair().await;
    send_raw(&mut tx, b"\n").await.unwrap();
    drop(tx);
    let mut reader = BufReader::new(rx);
    assert_eq!(read_line(&mut reader).await.unwrap().as_deref(), Some(""));
    assert_eq!(read_line(&mut reader).await.unwrap(), None);
  }

  #[tokio::test]
  async fn send_line_appends_newline_once() {
    let (mut tx, mut rx) = tcp_pair().await;
    send_line(&mut tx, "one").await.unwrap();
    send_line(&mut tx, "two\n").await.unwrap();
    drop(tx);

    let mut out = Vec::new();
    rx.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, b"one\ntwo\n");
  }

  #[tokio::test]
  async fn send_raw_is_unframed() {
    let (mut tx, mut rx) = tcp_pair().await;
    send_raw(&mut tx, b"abc").await.unwrap();
    drop(tx);

    let mut out = Vec::new();
    rx.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, b"abc");
  }
}
