//! Five-slot enrollment sequencer.
//!
//! Drives one [`UploadTask`] through the fixed slot sequence. Each success
//! schedules a delayed advance (or, on the last slot, a delayed completion)
//! so the success notice stays visible; failures pin the current slot until
//! the caller retries it.

use crate::types::{
    EnrollmentProgress, Failure, FailureKind, IdentityDraft, ImagePayload, ImageRef, SlotState,
    LAST_SLOT,
};
use crate::upload::{FaceUpload, Ticket, UploadOutcome, UploadTask};
use std::time::Duration;
use thiserror::Error;

/// Shown when the enrollment step is entered without registration data.
pub const MISSING_IDENTITY_MESSAGE: &str =
    "Missing student information. Please go back and fill the registration form.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("no active identity")]
    NoActiveIdentity,
    #[error("an image upload is already in progress")]
    Busy,
    #[error("slot {0} is still being confirmed")]
    AwaitingAdvance(usize),
    #[error("all enrollment images have been uploaded")]
    Complete,
}

/// Delays applied after a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Before moving on to the next slot.
    pub advance_delay: Duration,
    /// Before handing over to the results step after the last slot.
    pub complete_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_millis(1000),
            complete_delay: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Advance,
    Complete,
}

/// A scheduled transition, bound to the sequencer that scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    epoch: u64,
    kind: TimerKind,
}

impl Timer {
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// What firing a timer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    /// Stale or unexpected timer; nothing changed.
    Ignored,
    /// Moved on to the given slot.
    Advanced(usize),
    /// All slots are uploaded; the workflow should show results.
    Completed,
}

#[derive(Debug, Clone)]
pub struct EnrollmentSequencer {
    epoch: u64,
    identity: Option<IdentityDraft>,
    progress: EnrollmentProgress,
    current_index: usize,
    task: UploadTask,
    uploading: Option<ImageRef>,
    pending: Option<TimerKind>,
    completed: bool,
    notice: Option<String>,
    error: Option<Failure>,
}

impl EnrollmentSequencer {
    /// Create a sequencer bound to `identity`.
    ///
    /// Without an identity the sequencer is inert: every submission is
    /// refused locally and the missing-information message is shown.
    pub fn new(epoch: u64, identity: Option<IdentityDraft>) -> Self {
        let error = match identity {
            Some(_) => None,
            None => {
                tracing::warn!(epoch, "enrollment started without an identity");
                Some(Failure::new(FailureKind::Local, MISSING_IDENTITY_MESSAGE))
            }
        };

        Self {
            epoch,
            identity,
            progress: EnrollmentProgress::new(),
            current_index: 0,
            task: UploadTask::new(epoch),
            uploading: None,
            pending: None,
            completed: false,
            notice: None,
            error,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn identity(&self) -> Option<&IdentityDraft> {
        self.identity.as_ref()
    }

    pub fn is_inert(&self) -> bool {
        self.identity.is_none()
    }

    pub fn progress(&self) -> &EnrollmentProgress {
        &self.progress
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_busy(&self) -> bool {
        self.task.is_busy()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Transient success notice ("Image N uploaded successfully!").
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn error(&self) -> Option<&Failure> {
        self.error.as_ref()
    }

    /// Start uploading `image` into the current slot.
    ///
    /// Returns the ticket and request to hand to the backend. Nothing is
    /// queued: a refused call leaves the sequencer unchanged apart from the
    /// error shown for a missing identity.
    pub fn begin_upload(&mut self, image: ImagePayload) -> Result<(Ticket, FaceUpload), EnrollmentError> {
        let Some(identity) = self.identity.clone() else {
            self.error = Some(Failure::new(FailureKind::Local, MISSING_IDENTITY_MESSAGE));
            return Err(EnrollmentError::NoActiveIdentity);
        };

        if self.completed || self.pending == Some(TimerKind::Complete) {
            return Err(EnrollmentError::Complete);
        }
        if self.task.is_busy() {
            return Err(EnrollmentError::Busy);
        }
        if self.pending == Some(TimerKind::Advance) {
            return Err(EnrollmentError::AwaitingAdvance(self.current_index));
        }

        let ticket = self.task.begin().ok_or(EnrollmentError::Busy)?;
        let slot = self.current_index;

        self.progress.set(slot, SlotState::Uploading);
        self.uploading = Some(image.image_ref());
        self.notice = None;
        self.error = None;

        tracing::info!(slot, file = %image.file_name, "uploading enrollment image");

        Ok((
            ticket,
            FaceUpload {
                image,
                identity,
                slot,
            },
        ))
    }

    /// Apply the backend's answer for `ticket`.
    ///
    /// On success returns the transition to schedule and its delay. Stale
    /// tickets are dropped.
    pub fn settle_upload(
        &mut self,
        ticket: Ticket,
        outcome: UploadOutcome<String>,
        timing: &Timing,
    ) -> Option<(Duration, Timer)> {
        if !self.task.settle(ticket) {
            tracing::debug!(epoch = self.epoch, "dropping stale upload response");
            return None;
        }

        let slot = self.current_index;
        let image = self.uploading.take().unwrap_or_default();

        match outcome.failure() {
            None => {
                tracing::info!(slot, "enrollment image accepted");
                self.progress.set(slot, SlotState::Uploaded(image));
                self.notice = Some(format!("Image {} uploaded successfully!", slot + 1));

                let (kind, delay) = if slot == LAST_SLOT {
                    (TimerKind::Complete, timing.complete_delay)
                } else {
                    (TimerKind::Advance, timing.advance_delay)
                };
                self.pending = Some(kind);
                Some((
                    delay,
                    Timer {
                        epoch: self.epoch,
                        kind,
                    },
                ))
            }
            Some(failure) => {
                if let UploadOutcome::TransportFailure(detail) = &outcome {
                    tracing::warn!(slot, %detail, "enrollment upload failed in transport");
                } else {
                    tracing::info!(slot, reason = %failure.reason, "enrollment image rejected");
                }
                self.progress.set(slot, SlotState::Failed(failure.clone()));
                self.error = Some(failure);
                None
            }
        }
    }

    /// Apply a previously scheduled transition.
    pub fn fire(&mut self, timer: Timer) -> Fired {
        if timer.epoch != self.epoch || self.pending != Some(timer.kind) {
            tracing::debug!(epoch = self.epoch, timer = ?timer, "ignoring stale timer");
            return Fired::Ignored;
        }
        self.pending = None;

        match timer.kind {
            TimerKind::Advance => {
                self.current_index += 1;
                self.notice = None;
                tracing::debug!(slot = self.current_index, "advanced to next slot");
                Fired::Advanced(self.current_index)
            }
            TimerKind::Complete => {
                self.completed = true;
                tracing::info!("all enrollment images uploaded");
                Fired::Completed
            }
        }
    }
}
