use crate::protocol::error::Result;
use crate::protocol::{RpcRequest, RpcResponse};

/// JSON codec for protocol messages.
///
/// JSON is the only wire format; the codec is kept behind its own type so the
/// framing code never touches `serde_json` directly.
///
/// # Example
///
/// ```
/// use meshcall_common::transport::JsonCodec;
/// use meshcall_common::protocol::RpcRequest;
/// use serde_json::json;
///
/// let request = RpcRequest::new("/svc/op", json!({"n": 42}));
/// let encoded = JsonCodec::encode_request(&request).unwrap();
/// let decoded = JsonCodec::decode_request(&encoded).unwrap();
/// assert_eq!(request, decoded);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_request(request: &RpcRequest) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    pub fn decode_request(data: &[u8]) -> Result<RpcRequest> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode_response(response: &RpcResponse) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    pub fn decode_response(data: &[u8]) -> Result<RpcResponse> {
        Ok(serde_json::from_slice(data)?)
    }
}
