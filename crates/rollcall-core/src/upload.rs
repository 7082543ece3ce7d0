//! Upload boundary: typed outcomes, the backend trait, and the single-flight
//! gate each submitter owns.

use crate::types::{Failure, FailureKind, IdentityDraft, ImagePayload, RecognizedIdentity};
use std::future::Future;

/// Message shown for every transport failure. The detail is only logged.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Server error. Please try again.";

/// Result of one network submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome<T> {
    Success(T),
    /// Request completed but the server declined it (e.g. quality check failed).
    Rejected(String),
    /// Network, status or body-parse failure. Carries a diagnostic detail.
    TransportFailure(String),
}

impl<T> UploadOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success(_))
    }

    /// The user-visible failure, or `None` on success.
    pub fn failure(&self) -> Option<Failure> {
        match self {
            UploadOutcome::Success(_) => None,
            UploadOutcome::Rejected(reason) => Some(Failure::new(FailureKind::Rejected, reason.clone())),
            UploadOutcome::TransportFailure(_) => {
                Some(Failure::new(FailureKind::Transport, TRANSPORT_FAILURE_MESSAGE))
            }
        }
    }
}

/// One enrollment image submission.
#[derive(Debug, Clone)]
pub struct FaceUpload {
    pub image: ImagePayload,
    pub identity: IdentityDraft,
    /// Zero-based slot index (0..=4).
    pub slot: usize,
}

/// One group recognition submission.
#[derive(Debug, Clone)]
pub struct GroupPhoto {
    pub image: ImagePayload,
    /// Restrict matches to a single class.
    pub division: Option<String>,
}

/// The recognition/enrollment service as seen from the workflow.
pub trait FaceBackend: Send + Sync + 'static {
    /// Submit one enrollment image. `Success` carries the server message.
    fn upload_face(&self, upload: FaceUpload) -> impl Future<Output = UploadOutcome<String>> + Send;

    /// Submit a group photo. `Success` carries the (possibly empty) match list.
    fn recognize_group(
        &self,
        photo: GroupPhoto,
    ) -> impl Future<Output = UploadOutcome<Vec<RecognizedIdentity>>> + Send;
}

/// Identifies one in-flight submission of one [`UploadTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    epoch: u64,
    seq: u64,
}

impl Ticket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Single-flight gate for a fallible submission.
///
/// `begin` hands out a ticket and marks the task busy; only the matching
/// ticket can `settle` it. Tickets from another task (different epoch) or an
/// earlier submission never match.
#[derive(Debug, Clone)]
pub struct UploadTask {
    epoch: u64,
    next_seq: u64,
    in_flight: Option<u64>,
}

impl UploadTask {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            next_seq: 0,
            in_flight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a submission. Returns `None` while another one is in flight.
    pub fn begin(&mut self) -> Option<Ticket> {
        if self.in_flight.is_some() {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);
        Some(Ticket {
            epoch: self.epoch,
            seq,
        })
    }

    /// Finish the submission identified by `ticket`.
    ///
    /// Returns `false` (and changes nothing) for a stale or foreign ticket.
    pub fn settle(&mut self, ticket: Ticket) -> bool {
        if ticket.epoch != self.epoch || self.in_flight != Some(ticket.seq) {
            return false;
        }
        self.in_flight = None;
        true
    }
}
