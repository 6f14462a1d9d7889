// the line-oriented file service protocol spoken on both legs of the relay
use crate::error::{ProtocolError, Result};

pub const LIST: &str = "LIST";
pub const DOWNLOAD: &str = "DOWNLOAD";
pub const OK: &str = "OK";
pub const END_MARKER: &str = "END";

const OK_SIZED_PREFIX: &str = "OK ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
  List,
  Download,
  Other,
}

impl Verb {
  // The proxy only sniffs the first token to know what response shape to
  // expect; it never validates the request itself.
  pub fn sniff(line: &str) -> Verb {
    let token = line.split_whitespace().next().unwrap_or("");
    if token.eq_ignore_ascii_case(LIST) {
      Verb::List
    } else if token.eq_ignore_ascii_case(DOWNLOAD) {
      Verb::Download
    } else {
      Verb::Other
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
  // "OK <n>" after DOWNLOAD: n raw bytes follow
  Sized(u64),
  // "OK" after LIST: lines follow until END inclusive
  LinesUntilEnd,
  // anything else, including ERR: the header is the whole response
  HeaderOnly,
}

pub fn response_shape(verb: Verb, header: &str) -> Result<ResponseShape> {
  if verb == Verb::Download && header.starts_with(OK_SIZED_PREFIX) {
    let size = header[OK_SIZED_PREFIX.len()..]
      .trim()
      .parse::<u64>()
      .map_err(|_| ProtocolError(format!("invalid size in header {:?}", header)))?;
    Ok(ResponseShape::Sized(size))
  } else if verb == Verb::List && header == OK {
    Ok(ResponseShape::LinesUntilEnd)
  } else {
    Ok(ResponseShape::HeaderOnly)
  }
}
