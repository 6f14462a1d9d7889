use failure::Error;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Fail)]
#[fail(display = "failed to connect to backend: {}", _0)]
pub struct ConnectError(#[fail(cause)] pub io::Error);

#[derive(Debug, Fail)]
#[fail(display = "protocol error: {}", _0)]
pub struct ProtocolError(pub String);

#[derive(Debug, Fail)]
#[fail(display = "transport error: {}", _0)]
pub struct TransportError(pub String);
