use crate::enrollment::{EnrollmentError, Timer, Timing};
use crate::recognition::RecognitionError;
use crate::route::Route;
use crate::types::{ImagePayload, RecognizedIdentity, RegistrationForm, ValidationErrors};
use crate::upload::{FaceBackend, Ticket, UploadOutcome};
use crate::workflow::{Effect, WorkflowController, WorkflowState};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("enrollment: {0}")]
    Enrollment(#[from] EnrollmentError),
    #[error("recognition: {0}")]
    Recognition(#[from] RecognitionError),
    #[error("session task exited")]
    ChannelClosed,
}

/// Observable view of the workflow, published after every change.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: WorkflowState,
    pub route: Route,
}

impl Snapshot {
    fn of(controller: &WorkflowController) -> Self {
        Self {
            state: controller.state().clone(),
            route: controller.route(),
        }
    }
}

/// Messages sent from handles to the session task.
enum SessionRequest {
    SubmitRegistration {
        form: RegistrationForm,
        reply: oneshot::Sender<Result<(), ValidationErrors>>,
    },
    Navigate {
        route: Route,
        reply: oneshot::Sender<Route>,
    },
    SubmitImage {
        image: ImagePayload,
        reply: oneshot::Sender<Result<(), EnrollmentError>>,
    },
    SelectGroupPhoto {
        image: ImagePayload,
        division: Option<String>,
        reply: oneshot::Sender<Result<(), RecognitionError>>,
    },
    SubmitGroupPhoto {
        reply: oneshot::Sender<Result<(), RecognitionError>>,
    },
    FollowResultsAction {
        reply: oneshot::Sender<Route>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// Completions of work spawned by the session itself.
enum SessionEvent {
    FaceUploaded {
        ticket: Ticket,
        outcome: UploadOutcome<String>,
    },
    GroupRecognized {
        ticket: Ticket,
        outcome: UploadOutcome<Vec<RecognizedIdentity>>,
    },
    TimerFired(Timer),
}

/// Clone-safe handle to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionRequest,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Validate and store the registration, then start enrollment.
    pub async fn submit_registration(&self, form: RegistrationForm) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::SubmitRegistration { form, reply })
            .await?
            .map_err(SessionError::from)
    }

    /// Navigate with step guards applied. Returns the route actually shown.
    pub async fn navigate(&self, route: Route) -> Result<Route, SessionError> {
        self.request(|reply| SessionRequest::Navigate { route, reply })
            .await
    }

    /// Start uploading `image` into the current enrollment slot.
    ///
    /// Returns once the upload has started; watch the snapshots for its outcome.
    pub async fn submit_image(&self, image: ImagePayload) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::SubmitImage { image, reply })
            .await?
            .map_err(SessionError::from)
    }

    pub async fn select_group_photo(
        &self,
        image: ImagePayload,
        division: Option<String>,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::SelectGroupPhoto {
            image,
            division,
            reply,
        })
        .await?
        .map_err(SessionError::from)
    }

    /// Start recognizing the selected group photo.
    pub async fn submit_group_photo(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::SubmitGroupPhoto { reply })
            .await?
            .map_err(SessionError::from)
    }

    pub async fn follow_results_action(&self) -> Result<Route, SessionError> {
        self.request(|reply| SessionRequest::FollowResultsAction { reply })
            .await
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::Reset { reply }).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// Checks the current snapshot first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&Snapshot) -> bool,
    ) -> Result<Snapshot, SessionError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        Ok(snapshot.clone())
    }
}

/// Spawn the session task on the current tokio runtime.
///
/// The task owns the workflow and handles one request or completion at a
/// time. It exits when every handle has been dropped.
pub fn spawn_session<B: FaceBackend>(backend: Arc<B>, timing: Timing) -> SessionHandle {
    let controller = WorkflowController::new(timing);
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::of(&controller));
    let (tx, rx) = mpsc::channel::<SessionRequest>(4);
    let (events_tx, events_rx) = mpsc::unbounded_channel::<SessionEvent>();

    let session = Session {
        controller,
        backend,
        events_tx,
        snapshots: snapshot_tx,
    };
    tokio::spawn(session.run(rx, events_rx));

    SessionHandle {
        tx,
        snapshots: snapshot_rx,
    }
}

struct Session<B> {
    controller: WorkflowController,
    backend: Arc<B>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    snapshots: watch::Sender<Snapshot>,
}

impl<B: FaceBackend> Session<B> {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<SessionRequest>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        tracing::info!("session started");
        loop {
            tokio::select! {
                req = requests.recv() => match req {
                    Some(req) => self.handle_request(req),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }
        tracing::info!("session exiting");
    }

    /// Publish before replying so a caller never observes a stale snapshot
    /// after its request returned.
    fn handle_request(&mut self, req: SessionRequest) {
        match req {
            SessionRequest::SubmitRegistration { form, reply } => {
                let result = self.controller.submit_registration(&form);
                self.publish();
                let _ = reply.send(result);
            }
            SessionRequest::Navigate { route, reply } => {
                let shown = self.controller.navigate(route);
                self.publish();
                let _ = reply.send(shown);
            }
            SessionRequest::SubmitImage { image, reply } => {
                let result = self.controller.submit_image(image).map(|effect| self.dispatch(effect));
                if let Err(err) = &result {
                    tracing::info!(error = %err, "image submission refused");
                }
                self.publish();
                let _ = reply.send(result);
            }
            SessionRequest::SelectGroupPhoto {
                image,
                division,
                reply,
            } => {
                let result = self.controller.select_group_photo(image, division);
                self.publish();
                let _ = reply.send(result);
            }
            SessionRequest::SubmitGroupPhoto { reply } => {
                let result = self.controller.submit_group_photo().map(|effect| self.dispatch(effect));
                if let Err(err) = &result {
                    tracing::info!(error = %err, "group photo submission refused");
                }
                self.publish();
                let _ = reply.send(result);
            }
            SessionRequest::FollowResultsAction { reply } => {
                let shown = self.controller.follow_results_action();
                self.publish();
                let _ = reply.send(shown);
            }
            SessionRequest::Reset { reply } => {
                self.controller.reset();
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::FaceUploaded { ticket, outcome } => {
                if let Some(effect) = self.controller.settle_face_upload(ticket, outcome) {
                    self.dispatch(effect);
                }
            }
            SessionEvent::GroupRecognized { ticket, outcome } => {
                self.controller.settle_recognition(ticket, outcome);
            }
            SessionEvent::TimerFired(timer) => {
                self.controller.fire_timer(timer);
            }
        }
        self.publish();
    }

    /// Run an effect off the session task; its completion comes back as an event.
    fn dispatch(&self, effect: Effect) {
        let events = self.events_tx.clone();
        match effect {
            Effect::UploadFace { ticket, upload } => {
                let backend = Arc::clone(&self.backend);
                tokio::spawn(async move {
                    let outcome = backend.upload_face(upload).await;
                    let _ = events.send(SessionEvent::FaceUploaded { ticket, outcome });
                });
            }
            Effect::RecognizeGroup { ticket, photo } => {
                let backend = Arc::clone(&self.backend);
                tokio::spawn(async move {
                    let outcome = backend.recognize_group(photo).await;
                    let _ = events.send(SessionEvent::GroupRecognized { ticket, outcome });
                });
            }
            Effect::Schedule { delay, timer } => {
                tracing::debug!(?delay, kind = ?timer.kind(), "scheduling transition");
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(SessionEvent::TimerFired(timer));
                });
            }
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(Snapshot::of(&self.controller));
    }
}
