pub mod error;
pub mod requests;
pub mod responses;


pub use error::{MeshError, Result};
pub use requests::{MethodPath, RequestId, RpcArgs, RpcRequest};
pub use responses::{RpcResponse, RpcResult};
