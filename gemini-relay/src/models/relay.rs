use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

/// Inbound relay body. `contents` is forwarded to every candidate unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct RelayRequest {
    #[validate(length(min = 1, message = "contents must contain at least one turn"))]
    pub contents: Vec<Value>,
}
