//! rollcall-core: Enrollment and group recognition workflow.
//!
//! A state machine that sequences registration, the five-image enrollment
//! loop and single-shot group recognition against a face backend, plus the
//! session task that runs it.

pub mod enrollment;
pub mod presenter;
pub mod recognition;
pub mod route;
pub mod session;
pub mod types;
pub mod upload;
pub mod workflow;

pub use enrollment::{EnrollmentError, EnrollmentSequencer, Timing};
pub use presenter::{present, DisplayModel};
pub use recognition::{RecognitionError, RecognitionSubmitter};
pub use route::Route;
pub use session::{spawn_session, SessionError, SessionHandle, Snapshot};
pub use types::{
    EnrollmentProgress, Failure, FailureKind, IdentityDraft, ImagePayload, RecognitionResult,
    RecognizedIdentity, RegistrationForm, ResultsMode, ResultsPayload, SlotState, ENROLLMENT_SLOTS,
};
pub use upload::{FaceBackend, FaceUpload, GroupPhoto, UploadOutcome};
pub use workflow::{WorkflowController, WorkflowState};
