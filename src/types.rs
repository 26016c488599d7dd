use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct AboutResponse {
    pub versions: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    pub use_voice: bool,
}

/// `/v1/send` body: at most one attachment.
#[derive(Deserialize, Debug)]
pub struct SendRequest {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub base64_attachment: Option<String>,
}

/// `/v2/send` body.
#[derive(Deserialize, Debug)]
pub struct SendRequestV2 {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub base64_attachments: Vec<String>,
}
