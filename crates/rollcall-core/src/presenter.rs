//! Results view model.

use crate::route::Route;
use crate::types::{RecognizedIdentity, ResultsPayload};
use serde::Serialize;

/// Shown by a renderer when a recognition result has no matches.
pub const NO_MATCHES_TEXT: &str = "No students were recognized in the group photo.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayModel {
    pub heading: String,
    /// Absent for a recognition with no matches.
    pub body_text: Option<String>,
    pub items: Vec<RecognizedIdentity>,
    pub action_label: String,
    pub action_target: Route,
}

/// Map a results payload to what the results step displays.
pub fn present(payload: &ResultsPayload) -> DisplayModel {
    match payload {
        ResultsPayload::EnrollmentComplete => DisplayModel {
            heading: "Registration Complete".into(),
            body_text: Some("Your face data has been successfully registered in the system.".into()),
            items: Vec::new(),
            action_label: "Back to Home".into(),
            action_target: Route::Home,
        },
        ResultsPayload::RecognitionComplete(result) => DisplayModel {
            heading: "Recognition Results".into(),
            body_text: (!result.is_empty())
                .then(|| "The following students were recognized:".to_string()),
            items: result.matches().to_vec(),
            action_label: "Start New Recognition".into(),
            action_target: Route::GroupRecognition,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecognitionResult;

    #[test]
    fn test_enrollment_complete() {
        let model = present(&ResultsPayload::EnrollmentComplete);
        assert_eq!(model.heading, "Registration Complete");
        assert!(model.body_text.is_some());
        assert!(model.items.is_empty());
        assert_eq!(model.action_target, Route::Home);
    }

    #[test]
    fn test_recognition_with_matches() {
        let bo = RecognizedIdentity {
            name: "Bo".into(),
            roll_no: "9".into(),
            class: "5A".into(),
        };
        let payload = ResultsPayload::RecognitionComplete(RecognitionResult::new(vec![bo.clone()]));
        let model = present(&payload);
        assert_eq!(model.heading, "Recognition Results");
        assert_eq!(model.items, vec![bo]);
        assert_eq!(
            model.body_text.as_deref(),
            Some("The following students were recognized:")
        );
        assert_eq!(model.action_target, Route::GroupRecognition);
    }

    #[test]
    fn test_recognition_without_matches_is_not_an_error() {
        let model = present(&ResultsPayload::RecognitionComplete(RecognitionResult::default()));
        assert!(model.items.is_empty());
        assert!(model.body_text.is_none());
        assert_eq!(model.heading, "Recognition Results");
        assert_eq!(model.action_label, "Start New Recognition");
    }
}
