pub mod cameras;
pub mod recording;
pub mod stream;
pub mod system;

pub use cameras::*;
pub use recording::*;
pub use stream::*;
pub use system::*;

use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}
