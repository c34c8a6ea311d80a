use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::error::{MeshError, Result};
use crate::protocol::{RpcArgs, RpcRequest, RpcResult};
use crate::transport::codec::JsonCodec;
use crate::transport::{Connection, Transport};

/// Messages larger than this are rejected before allocation.
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// TCP implementation of the [`Transport`] contract.
///
/// Opens one stream per connection request. Connection establishment is
/// bounded by the timeout the caller passes to [`Transport::connect`]; the
/// per-call deadline is enforced inside [`Connection::invoke`].
///
/// # Example
///
/// ```no_run
/// use meshcall_common::transport::{TcpTransport, Transport};
/// use serde_json::json;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TcpTransport::new();
/// let mut conn = transport
///     .connect("127.0.0.1", 8079, Duration::from_secs(1))
///     .await?;
/// let result = conn.invoke("/svc/op", json!({"n": 100}), None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| MeshError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| {
                MeshError::Connection(format!("failed to connect to {}:{}: {}", host, port, e))
            })?;

        Ok(Box::new(TcpConnection { stream }))
    }
}

/// One established TCP connection, speaking the length-prefixed JSON protocol.
pub struct TcpConnection {
    stream: TcpStream,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn invoke(
        &mut self,
        path: &str,
        args: RpcArgs,
        deadline: Option<Duration>,
    ) -> Result<RpcResult> {
        let request = match deadline {
            Some(d) => RpcRequest::new(path, args).with_deadline(d.as_millis() as u64),
            None => RpcRequest::new(path, args),
        };

        // Payloads land in whatever span is active around the call.
        tracing::debug!(id = request.id, path = %request.path, payload = %request.args, "rpc request");

        let exchange = Self::exchange(&mut self.stream, &request);
        let response = match deadline {
            Some(d) => tokio::time::timeout(d, exchange)
                .await
                .map_err(|_| MeshError::Timeout(d.as_millis() as u64))??,
            None => exchange.await?,
        };

        if response.id != request.id {
            return Err(MeshError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        tracing::debug!(
            id = response.id,
            success = response.success,
            payload = %response.result.as_ref().unwrap_or(&serde_json::Value::Null),
            "rpc response"
        );

        if response.success {
            response
                .result
                .ok_or_else(|| MeshError::InvalidResponse("missing result in success response".to_string()))
        } else {
            Err(MeshError::Remote(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

impl TcpConnection {
    async fn exchange(stream: &mut TcpStream, request: &RpcRequest) -> Result<crate::RpcResponse> {
        let encoded = JsonCodec::encode_request(request)?;
        send_message(stream, &encoded).await?;
        let raw = receive_message(stream).await?;
        JsonCodec::decode_response(&raw)
    }
}

/// Sends one length-prefixed message.
///
/// Wire format: `[4-byte length as u32 big-endian] + [data]`
pub async fn send_message(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
    let len = data.len() as u32;

    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| map_io_error(e, "writing length prefix"))?;
    stream
        .write_all(data)
        .await
        .map_err(|e| map_io_error(e, "writing data"))?;
    stream
        .flush()
        .await
        .map_err(|e| map_io_error(e, "flushing stream"))?;

    Ok(())
}

/// Receives one length-prefixed message, rejecting frames over [`MAX_MESSAGE_SIZE`].
pub async fn receive_message(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| map_io_error(e, "reading length prefix"))?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(MeshError::InvalidResponse(format!(
            "message too large: {} bytes (max {} bytes)",
            len, MAX_MESSAGE_SIZE
        )));
    }

    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| map_io_error(e, "reading data"))?;

    Ok(buf)
}

/// Maps IO errors onto the pipeline taxonomy: connection loss becomes
/// `Connection`, everything else stays `Io`.
fn map_io_error(err: std::io::Error, context: &str) -> MeshError {
    match err.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::NotConnected => {
            MeshError::Connection(format!("{}: connection lost", context))
        }
        _ => MeshError::Io(err),
    }
}
