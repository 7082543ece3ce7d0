//! Top-level workflow state machine.
//!
//! The controller owns the only copy of [`WorkflowState`] and is the only
//! thing that changes its variant. Network calls and delays are not run
//! here: operations that need one return an [`Effect`] for the driver to
//! execute, and the driver feeds the outcome back through the `settle_*`
//! and [`fire_timer`](WorkflowController::fire_timer) methods.

use crate::enrollment::{EnrollmentError, EnrollmentSequencer, Fired, Timer, Timing};
use crate::presenter::{present, DisplayModel};
use crate::recognition::{RecognitionError, RecognitionSubmitter};
use crate::route::Route;
use crate::types::{
    IdentityDraft, ImagePayload, RecognitionResult, RecognizedIdentity, RegistrationForm,
    ResultsMode, ResultsPayload, ValidationErrors,
};
use crate::upload::{FaceUpload, GroupPhoto, Ticket, UploadOutcome};
use std::time::Duration;

/// The active workflow step and the data it carries.
#[derive(Debug, Clone)]
pub enum WorkflowState {
    Home,
    Registering,
    Enrolling(EnrollmentSequencer),
    RecognizingGroup(RecognitionSubmitter),
    ShowingResults(ResultsPayload),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Home => "home",
            WorkflowState::Registering => "registering",
            WorkflowState::Enrolling(_) => "enrolling",
            WorkflowState::RecognizingGroup(_) => "recognizing_group",
            WorkflowState::ShowingResults(_) => "showing_results",
        }
    }

    /// The location that renders this state.
    pub fn route(&self) -> Route {
        match self {
            WorkflowState::Home => Route::Home,
            WorkflowState::Registering => Route::Registration,
            WorkflowState::Enrolling(_) => Route::FaceCapture,
            WorkflowState::RecognizingGroup(_) => Route::GroupRecognition,
            WorkflowState::ShowingResults(payload) => match payload.mode() {
                ResultsMode::EnrollmentComplete => Route::StudentResults,
                ResultsMode::RecognitionComplete => Route::GroupResults,
            },
        }
    }

    /// True while an upload owned by the active step is in flight.
    pub fn is_busy(&self) -> bool {
        match self {
            WorkflowState::Enrolling(seq) => seq.is_busy(),
            WorkflowState::RecognizingGroup(sub) => sub.is_busy(),
            _ => false,
        }
    }

    /// The error currently shown by the active step.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            WorkflowState::Enrolling(seq) => seq.error().map(|f| f.reason.as_str()),
            WorkflowState::RecognizingGroup(sub) => sub.error().map(|f| f.reason.as_str()),
            _ => None,
        }
    }
}

/// Work the driver must perform on the controller's behalf.
#[derive(Debug, Clone)]
pub enum Effect {
    UploadFace { ticket: Ticket, upload: FaceUpload },
    RecognizeGroup { ticket: Ticket, photo: GroupPhoto },
    Schedule { delay: Duration, timer: Timer },
}

#[derive(Debug)]
pub struct WorkflowController {
    state: WorkflowState,
    identity: Option<IdentityDraft>,
    timing: Timing,
    next_epoch: u64,
}

impl Default for WorkflowController {
    fn default() -> Self {
        Self::new(Timing::default())
    }
}

impl WorkflowController {
    pub fn new(timing: Timing) -> Self {
        Self {
            state: WorkflowState::Home,
            identity: None,
            timing,
            next_epoch: 1,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn route(&self) -> Route {
        self.state.route()
    }

    /// The stored registration, kept until reset.
    pub fn identity(&self) -> Option<&IdentityDraft> {
        self.identity.as_ref()
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    fn next_epoch(&mut self) -> u64 {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        epoch
    }

    fn transition(&mut self, next: WorkflowState) {
        tracing::info!(from = self.state.name(), to = next.name(), "workflow transition");
        self.state = next;
    }

    /// Validate the form, store the identity and start enrollment.
    ///
    /// On validation failure nothing changes.
    pub fn submit_registration(&mut self, form: &RegistrationForm) -> Result<(), ValidationErrors> {
        let draft = form.validate().map_err(|errors| {
            tracing::info!(%errors, "registration rejected");
            errors
        })?;
        tracing::info!(name = draft.name(), roll_no = draft.roll_no(), "registration accepted");

        self.identity = Some(draft.clone());
        let epoch = self.next_epoch();
        self.transition(WorkflowState::Enrolling(EnrollmentSequencer::new(epoch, Some(draft))));
        Ok(())
    }

    pub fn enter_registration(&mut self) {
        self.transition(WorkflowState::Registering);
    }

    /// Enter the capture step, or fall back to registration if no identity
    /// has been stored.
    pub fn enter_enrollment(&mut self) {
        match self.identity.clone() {
            Some(draft) => {
                let epoch = self.next_epoch();
                self.transition(WorkflowState::Enrolling(EnrollmentSequencer::new(epoch, Some(draft))));
            }
            None => {
                tracing::info!("no identity stored; redirecting to registration");
                self.transition(WorkflowState::Registering);
            }
        }
    }

    pub fn enter_recognition(&mut self) {
        let epoch = self.next_epoch();
        self.transition(WorkflowState::RecognizingGroup(RecognitionSubmitter::new(epoch)));
    }

    /// Submit an image for the current enrollment slot.
    pub fn submit_image(&mut self, image: ImagePayload) -> Result<Effect, EnrollmentError> {
        let WorkflowState::Enrolling(seq) = &mut self.state else {
            return Err(EnrollmentError::NoActiveIdentity);
        };
        let (ticket, upload) = seq.begin_upload(image)?;
        Ok(Effect::UploadFace { ticket, upload })
    }

    pub fn select_group_photo(
        &mut self,
        image: ImagePayload,
        division: Option<String>,
    ) -> Result<(), RecognitionError> {
        let WorkflowState::RecognizingGroup(sub) = &mut self.state else {
            return Err(RecognitionError::NotActive);
        };
        sub.select_image(image);
        sub.set_division(division);
        Ok(())
    }

    pub fn submit_group_photo(&mut self) -> Result<Effect, RecognitionError> {
        let WorkflowState::RecognizingGroup(sub) = &mut self.state else {
            return Err(RecognitionError::NotActive);
        };
        let (ticket, photo) = sub.begin()?;
        Ok(Effect::RecognizeGroup { ticket, photo })
    }

    /// Deliver an enrollment upload outcome. Returns a timer to schedule.
    pub fn settle_face_upload(&mut self, ticket: Ticket, outcome: UploadOutcome<String>) -> Option<Effect> {
        let timing = self.timing;
        match &mut self.state {
            WorkflowState::Enrolling(seq) => seq
                .settle_upload(ticket, outcome, &timing)
                .map(|(delay, timer)| Effect::Schedule { delay, timer }),
            other => {
                tracing::debug!(state = other.name(), "upload response arrived outside enrollment; ignored");
                None
            }
        }
    }

    /// Deliver a recognition outcome; success moves to the results step.
    pub fn settle_recognition(
        &mut self,
        ticket: Ticket,
        outcome: UploadOutcome<Vec<RecognizedIdentity>>,
    ) {
        let result = match &mut self.state {
            WorkflowState::RecognizingGroup(sub) => sub.settle(ticket, outcome),
            other => {
                tracing::debug!(state = other.name(), "recognition response arrived outside recognition; ignored");
                None
            }
        };
        if let Some(result) = result {
            self.complete_recognition(result);
        }
    }

    /// Apply a scheduled enrollment transition. Stale timers are no-ops.
    pub fn fire_timer(&mut self, timer: Timer) {
        let fired = match &mut self.state {
            WorkflowState::Enrolling(seq) => seq.fire(timer),
            other => {
                tracing::debug!(state = other.name(), "timer fired outside enrollment; ignored");
                Fired::Ignored
            }
        };
        if fired == Fired::Completed {
            self.complete_enrollment();
        }
    }

    /// Show the enrollment success results. The identity stays stored.
    pub fn complete_enrollment(&mut self) {
        self.transition(WorkflowState::ShowingResults(ResultsPayload::EnrollmentComplete));
    }

    /// Show recognition results; an empty result is a valid outcome.
    pub fn complete_recognition(&mut self, result: RecognitionResult) {
        self.transition(WorkflowState::ShowingResults(ResultsPayload::RecognitionComplete(result)));
    }

    /// Drop all workflow data and return home. Idempotent.
    pub fn reset(&mut self) {
        self.identity = None;
        if !matches!(self.state, WorkflowState::Home) {
            self.transition(WorkflowState::Home);
        }
    }

    /// Go to `route`, honouring the step guards. Returns where we ended up.
    ///
    /// Result routes are only reachable while those results are showing.
    pub fn navigate(&mut self, route: Route) -> Route {
        match route {
            Route::Home => {
                if !matches!(self.state, WorkflowState::Home) {
                    self.transition(WorkflowState::Home);
                }
            }
            Route::Registration => self.enter_registration(),
            Route::FaceCapture => self.enter_enrollment(),
            Route::GroupRecognition => self.enter_recognition(),
            Route::StudentResults | Route::GroupResults => {
                if self.route() != route {
                    tracing::info!(requested = %route, "no results to show; redirecting home");
                    self.transition(WorkflowState::Home);
                }
            }
        }
        self.route()
    }

    /// View model for the results step, if it is active.
    pub fn results_view(&self) -> Option<DisplayModel> {
        match &self.state {
            WorkflowState::ShowingResults(payload) => Some(present(payload)),
            _ => None,
        }
    }

    /// Act on the results step's button: reset, then go to its target.
    pub fn follow_results_action(&mut self) -> Route {
        let target = self
            .results_view()
            .map(|view| view.action_target)
            .unwrap_or(Route::Home);
        self.reset();
        self.navigate(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::TimerKind;
    use crate::types::{SlotState, ENROLLMENT_SLOTS};

    fn asha() -> RegistrationForm {
        RegistrationForm::new("Asha", "12", "7B")
    }

    fn image() -> ImagePayload {
        ImagePayload::new("face.jpg", "image/jpeg", vec![7u8; 8])
    }

    fn bo() -> RecognizedIdentity {
        RecognizedIdentity {
            name: "Bo".into(),
            roll_no: "9".into(),
            class: "5A".into(),
        }
    }

    /// Upload the current slot successfully and fire its timer.
    fn upload_ok(ctl: &mut WorkflowController) -> Timer {
        let Effect::UploadFace { ticket, .. } = ctl.submit_image(image()).unwrap() else {
            panic!("expected upload effect");
        };
        let Some(Effect::Schedule { timer, .. }) =
            ctl.settle_face_upload(ticket, UploadOutcome::Success("ok".into()))
        else {
            panic!("expected schedule effect");
        };
        timer
    }

    fn states_for_reset(ctl: &mut WorkflowController, which: usize) {
        match which {
            0 => {}
            1 => ctl.enter_registration(),
            2 => ctl.submit_registration(&asha()).unwrap(),
            3 => ctl.enter_recognition(),
            4 => ctl.complete_recognition(RecognitionResult::new(vec![bo()])),
            _ => {
                ctl.submit_registration(&asha()).unwrap();
                ctl.complete_enrollment();
            }
        }
    }

    #[test]
    fn test_registration_starts_enrollment() {
        let mut ctl = WorkflowController::default();
        ctl.submit_registration(&asha()).unwrap();

        let WorkflowState::Enrolling(seq) = ctl.state() else {
            panic!("expected enrolling, got {}", ctl.state().name());
        };
        assert_eq!(seq.current_index(), 0);
        assert_eq!(seq.progress().slot(0), Some(&SlotState::Pending));
        assert_eq!(seq.identity().unwrap().name(), "Asha");
        assert_eq!(ctl.identity().unwrap().roll_no(), "12");
        assert_eq!(ctl.route(), Route::FaceCapture);
    }

    #[test]
    fn test_invalid_registration_does_not_transition() {
        let mut ctl = WorkflowController::default();
        ctl.enter_registration();

        let errors = ctl
            .submit_registration(&RegistrationForm::new("Asha", "", "7B"))
            .unwrap_err();
        assert_eq!(errors.fields(), &[crate::types::DraftField::RollNo]);
        assert!(matches!(ctl.state(), WorkflowState::Registering));
        assert!(ctl.identity().is_none());
    }

    #[test]
    fn test_enter_enrollment_without_identity_redirects() {
        let mut ctl = WorkflowController::default();
        ctl.enter_enrollment();
        assert!(matches!(ctl.state(), WorkflowState::Registering));
        assert_eq!(ctl.navigate(Route::FaceCapture), Route::Registration);
    }

    #[test]
    fn test_enter_enrollment_with_identity() {
        let mut ctl = WorkflowController::default();
        ctl.submit_registration(&asha()).unwrap();
        ctl.navigate(Route::Home);
        assert_eq!(ctl.navigate(Route::FaceCapture), Route::FaceCapture);
        let WorkflowState::Enrolling(seq) = ctl.state() else {
            panic!("expected enrolling");
        };
        assert_eq!(seq.identity().unwrap().class(), "7B");
    }

    #[test]
    fn test_submit_image_outside_enrollment() {
        let mut ctl = WorkflowController::default();
        assert_eq!(
            ctl.submit_image(image()).unwrap_err(),
            EnrollmentError::NoActiveIdentity
        );
    }

    #[test]
    fn test_full_enrollment_reaches_results_once() {
        let mut ctl = WorkflowController::default();
        ctl.submit_registration(&asha()).unwrap();

        for slot in 0..ENROLLMENT_SLOTS {
            let timer = upload_ok(&mut ctl);
            assert!(matches!(ctl.state(), WorkflowState::Enrolling(_)), "slot {slot}");
            if slot + 1 < ENROLLMENT_SLOTS {
                assert_eq!(timer.kind(), TimerKind::Advance);
            } else {
                assert_eq!(timer.kind(), TimerKind::Complete);
            }
            ctl.fire_timer(timer);
            if slot + 1 < ENROLLMENT_SLOTS {
                assert!(matches!(ctl.state(), WorkflowState::Enrolling(_)));
            } else {
                assert!(matches!(
                    ctl.state(),
                    WorkflowState::ShowingResults(ResultsPayload::EnrollmentComplete)
                ));
                // A duplicate firing is a no-op.
                ctl.fire_timer(timer);
                assert_eq!(ctl.route(), Route::StudentResults);
            }
        }

        assert_eq!(ctl.identity().unwrap().name(), "Asha");
    }

    #[test]
    fn test_rejected_upload_keeps_slot() {
        let mut ctl = WorkflowController::default();
        ctl.submit_registration(&asha()).unwrap();
        for _ in 0..2 {
            let timer = upload_ok(&mut ctl);
            ctl.fire_timer(timer);
        }

        let Effect::UploadFace { ticket, upload } = ctl.submit_image(image()).unwrap() else {
            panic!("expected upload effect");
        };
        assert_eq!(upload.slot, 2);
        let next = ctl.settle_face_upload(ticket, UploadOutcome::Rejected("face not detected".into()));
        assert!(next.is_none());

        let WorkflowState::Enrolling(seq) = ctl.state() else {
            panic!("expected enrolling");
        };
        assert_eq!(seq.current_index(), 2);
        assert!(matches!(seq.progress().slot(2), Some(SlotState::Failed(f)) if f.reason == "face not detected"));
        assert_eq!(ctl.state().error_message(), Some("face not detected"));

        let Effect::UploadFace { upload, .. } = ctl.submit_image(image()).unwrap() else {
            panic!("expected upload effect");
        };
        assert_eq!(upload.slot, 2);
    }

    #[test]
    fn test_timer_after_reset_is_noop() {
        let mut ctl = WorkflowController::default();
        ctl.submit_registration(&asha()).unwrap();
        let timer = upload_ok(&mut ctl);

        ctl.reset();
        ctl.fire_timer(timer);
        assert!(matches!(ctl.state(), WorkflowState::Home));

        // Even after re-registering, the old timer belongs to a dead sequencer.
        ctl.submit_registration(&asha()).unwrap();
        ctl.fire_timer(timer);
        let WorkflowState::Enrolling(seq) = ctl.state() else {
            panic!("expected enrolling");
        };
        assert_eq!(seq.current_index(), 0);
    }

    #[test]
    fn test_response_after_reset_is_ignored() {
        let mut ctl = WorkflowController::default();
        ctl.submit_registration(&asha()).unwrap();
        let Effect::UploadFace { ticket, .. } = ctl.submit_image(image()).unwrap() else {
            panic!("expected upload effect");
        };

        ctl.reset();
        ctl.submit_registration(&asha()).unwrap();
        assert!(ctl
            .settle_face_upload(ticket, UploadOutcome::Success("late".into()))
            .is_none());
        let WorkflowState::Enrolling(seq) = ctl.state() else {
            panic!("expected enrolling");
        };
        assert_eq!(seq.progress().slot(0), Some(&SlotState::Pending));
    }

    #[test]
    fn test_recognition_with_match() {
        let mut ctl = WorkflowController::default();
        ctl.enter_recognition();
        ctl.select_group_photo(image(), None).unwrap();
        let Effect::RecognizeGroup { ticket, .. } = ctl.submit_group_photo().unwrap() else {
            panic!("expected recognition effect");
        };
        ctl.settle_recognition(ticket, UploadOutcome::Success(vec![bo()]));

        let view = ctl.results_view().unwrap();
        assert_eq!(view.items, vec![bo()]);
        assert_eq!(ctl.route(), Route::GroupResults);
    }

    #[test]
    fn test_recognition_with_no_matches() {
        let mut ctl = WorkflowController::default();
        ctl.enter_recognition();
        ctl.select_group_photo(image(), None).unwrap();
        let Effect::RecognizeGroup { ticket, .. } = ctl.submit_group_photo().unwrap() else {
            panic!("expected recognition effect");
        };
        ctl.settle_recognition(ticket, UploadOutcome::Success(vec![]));

        let WorkflowState::ShowingResults(ResultsPayload::RecognitionComplete(result)) = ctl.state() else {
            panic!("expected recognition results");
        };
        assert!(result.is_empty());
        assert!(ctl.state().error_message().is_none());
        let view = ctl.results_view().unwrap();
        assert!(view.items.is_empty());
        assert!(view.body_text.is_none());
    }

    #[test]
    fn test_recognition_failure_stays_on_step() {
        let mut ctl = WorkflowController::default();
        ctl.enter_recognition();
        assert_eq!(ctl.submit_group_photo().unwrap_err(), RecognitionError::NoImageSelected);
        assert_eq!(ctl.state().error_message(), Some(crate::recognition::NO_IMAGE_MESSAGE));

        ctl.select_group_photo(image(), Some("5A".into())).unwrap();
        let Effect::RecognizeGroup { ticket, photo } = ctl.submit_group_photo().unwrap() else {
            panic!("expected recognition effect");
        };
        assert_eq!(photo.division.as_deref(), Some("5A"));
        assert!(ctl.state().is_busy());

        ctl.settle_recognition(ticket, UploadOutcome::TransportFailure("refused".into()));
        assert_eq!(ctl.route(), Route::GroupRecognition);
        assert!(!ctl.state().is_busy());
        assert_eq!(ctl.state().error_message(), Some(crate::upload::TRANSPORT_FAILURE_MESSAGE));
    }

    #[test]
    fn test_select_photo_outside_recognition() {
        let mut ctl = WorkflowController::default();
        assert_eq!(
            ctl.select_group_photo(image(), None).unwrap_err(),
            RecognitionError::NotActive
        );
    }

    #[test]
    fn test_reset_from_every_state_is_idempotent() {
        for which in 0..6 {
            let mut ctl = WorkflowController::default();
            states_for_reset(&mut ctl, which);

            ctl.reset();
            assert!(matches!(ctl.state(), WorkflowState::Home));
            assert!(ctl.identity().is_none());
            assert!(ctl.results_view().is_none());

            ctl.reset();
            assert!(matches!(ctl.state(), WorkflowState::Home));
            assert!(ctl.identity().is_none());
        }
    }

    #[test]
    fn test_results_routes_redirect_without_results() {
        let mut ctl = WorkflowController::default();
        assert_eq!(ctl.navigate(Route::GroupResults), Route::Home);
        assert_eq!(ctl.navigate(Route::StudentResults), Route::Home);

        ctl.complete_recognition(RecognitionResult::default());
        assert_eq!(ctl.navigate(Route::GroupResults), Route::GroupResults);
        assert_eq!(ctl.navigate(Route::StudentResults), Route::Home);
    }

    #[test]
    fn test_follow_results_action() {
        let mut ctl = WorkflowController::default();
        ctl.complete_recognition(RecognitionResult::new(vec![bo()]));
        assert_eq!(ctl.follow_results_action(), Route::GroupRecognition);
        assert!(matches!(ctl.state(), WorkflowState::RecognizingGroup(_)));

        ctl.submit_registration(&asha()).unwrap();
        ctl.complete_enrollment();
        assert_eq!(ctl.follow_results_action(), Route::Home);
        assert!(ctl.identity().is_none());
    }
}
