//! JSON response schema of the face backend and its mapping onto
//! [`UploadOutcome`].
//!
//! The backend answers rejections with HTTP 400 and a `success: false`
//! body, so the body is interpreted before the status code.

use rollcall_core::{RecognizedIdentity, UploadOutcome};
use serde::Deserialize;

pub const UPLOAD_FACE_PATH: &str = "/api/upload-face";
pub const RECOGNIZE_GROUP_PATH: &str = "/api/recognize-group";

/// Shown when the server declines an enrollment image without a message.
pub const UPLOAD_REJECTED_DEFAULT: &str = "Failed to upload image";
/// Shown when the server declines a group photo without a message.
pub const RECOGNITION_REJECTED_DEFAULT: &str = "Recognition failed";

#[derive(Debug, Deserialize)]
pub struct UploadFaceResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecognizeGroupResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub recognized_students: Option<Vec<WireStudent>>,
}

/// One matched student as sent by the backend. Extra fields are ignored.
#[derive(Debug, Deserialize)]
pub struct WireStudent {
    pub name: String,
    pub roll_no: String,
    #[serde(alias = "division")]
    pub class: String,
}

impl From<WireStudent> for RecognizedIdentity {
    fn from(s: WireStudent) -> Self {
        RecognizedIdentity {
            name: s.name,
            roll_no: s.roll_no,
            class: s.class,
        }
    }
}

/// Decide rejection or status failure shared by both endpoints.
fn classify<T>(status: u16, success: bool, message: Option<String>, default: &str) -> Option<UploadOutcome<T>> {
    if !success {
        let reason = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default.to_string());
        return Some(UploadOutcome::Rejected(reason));
    }
    if !(200..300).contains(&status) {
        return Some(UploadOutcome::TransportFailure(format!(
            "unexpected status {status} for a successful body"
        )));
    }
    None
}

pub fn interpret_upload(status: u16, body: &[u8]) -> UploadOutcome<String> {
    let resp: UploadFaceResponse = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => {
            return UploadOutcome::TransportFailure(format!("status {status}: malformed response: {e}"))
        }
    };

    if let Some(outcome) = classify(status, resp.success, resp.message.clone(), UPLOAD_REJECTED_DEFAULT) {
        return outcome;
    }
    UploadOutcome::Success(resp.message.unwrap_or_default())
}

/// A missing `recognized_students` on success is an empty match list.
/// Duplicate students (same roll number and class) are reported once.
pub fn interpret_recognition(status: u16, body: &[u8]) -> UploadOutcome<Vec<RecognizedIdentity>> {
    let resp: RecognizeGroupResponse = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => {
            return UploadOutcome::TransportFailure(format!("status {status}: malformed response: {e}"))
        }
    };

    if let Some(outcome) = classify(status, resp.success, resp.message, RECOGNITION_REJECTED_DEFAULT) {
        return outcome;
    }

    let mut matches: Vec<RecognizedIdentity> = Vec::new();
    for student in resp.recognized_students.unwrap_or_default() {
        let student = RecognizedIdentity::from(student);
        if matches
            .iter()
            .any(|m| m.roll_no == student.roll_no && m.class == student.class)
        {
            continue;
        }
        matches.push(student);
    }
    UploadOutcome::Success(matches)
}
