//! Single-shot group photo recognition.

use crate::types::{Failure, FailureKind, ImagePayload, RecognitionResult, RecognizedIdentity};
use crate::upload::{GroupPhoto, Ticket, UploadOutcome, UploadTask};
use thiserror::Error;

pub const NO_IMAGE_MESSAGE: &str = "Please select an image first";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("please select an image")]
    NoImageSelected,
    #[error("a recognition request is already in progress")]
    Busy,
    #[error("group recognition is not the active step")]
    NotActive,
}

#[derive(Debug, Clone)]
pub struct RecognitionSubmitter {
    task: UploadTask,
    selected: Option<ImagePayload>,
    division: Option<String>,
    error: Option<Failure>,
}

impl RecognitionSubmitter {
    pub fn new(epoch: u64) -> Self {
        Self {
            task: UploadTask::new(epoch),
            selected: None,
            division: None,
            error: None,
        }
    }

    pub fn selected(&self) -> Option<&ImagePayload> {
        self.selected.as_ref()
    }

    pub fn division(&self) -> Option<&str> {
        self.division.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.task.is_busy()
    }

    pub fn error(&self) -> Option<&Failure> {
        self.error.as_ref()
    }

    /// Choose the photo to submit. Clears any previous error.
    pub fn select_image(&mut self, image: ImagePayload) {
        tracing::debug!(file = %image.file_name, "group photo selected");
        self.selected = Some(image);
        self.error = None;
    }

    /// Restrict matching to one class; blank clears the filter.
    pub fn set_division(&mut self, division: Option<String>) {
        self.division = division
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    /// Start a recognition request for the selected photo.
    pub fn begin(&mut self) -> Result<(Ticket, GroupPhoto), RecognitionError> {
        if self.task.is_busy() {
            return Err(RecognitionError::Busy);
        }
        let Some(image) = self.selected.clone() else {
            self.error = Some(Failure::new(FailureKind::Local, NO_IMAGE_MESSAGE));
            return Err(RecognitionError::NoImageSelected);
        };

        let ticket = self.task.begin().ok_or(RecognitionError::Busy)?;
        self.error = None;

        tracing::info!(file = %image.file_name, division = ?self.division, "submitting group photo");

        Ok((
            ticket,
            GroupPhoto {
                image,
                division: self.division.clone(),
            },
        ))
    }

    /// Apply the backend's answer. Returns the result on success.
    ///
    /// On failure the error is shown and the selected photo is kept so the
    /// request can be retried without reselecting.
    pub fn settle(
        &mut self,
        ticket: Ticket,
        outcome: UploadOutcome<Vec<RecognizedIdentity>>,
    ) -> Option<RecognitionResult> {
        if !self.task.settle(ticket) {
            tracing::debug!("dropping stale recognition response");
            return None;
        }

        match outcome {
            UploadOutcome::Success(matches) => {
                tracing::info!(matched = matches.len(), "group photo recognized");
                Some(RecognitionResult::new(matches))
            }
            other => {
                if let UploadOutcome::TransportFailure(detail) = &other {
                    tracing::warn!(%detail, "recognition request failed in transport");
                }
                let failure = other.failure();
                if let Some(failure) = &failure {
                    tracing::info!(reason = %failure.reason, "recognition failed");
                }
                self.error = failure;
                None
            }
        }
    }
}
