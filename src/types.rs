use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognizeQuery {
    /// Return the bare identifier (`alice`) instead of the stored path.
    #[serde(default = "default_true")]
    pub return_image_name: bool,
    #[serde(default)]
    pub grayscale: bool,
    #[serde(default)]
    pub resize: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterQuery {
    /// Name to store the upload under; the upload's own name when absent.
    pub img_save_name: Option<String>,
    #[serde(default)]
    pub grayscale: bool,
    /// Falls back to `preprocess.resize` from the configuration.
    pub resize: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameQuery {
    pub src_path: String,
    pub img_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteQuery {
    pub img_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfoQuery {
    #[serde(default = "default_true")]
    pub return_img_file: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecognitionResponse {
    Match { name: String, path: String, score: f64 },
    NoMatch { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameResponse {
    pub message: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    pub message: String,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub number_of_images: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_images_file: Option<Vec<String>>,
}
