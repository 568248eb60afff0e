//! Request and response bodies

pub mod loan;

pub use loan::*;

use serde::{Deserialize, Serialize};

/// `{"status": "...", "message": "..."}` acknowledgement body
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}
