//! Scripted runs of the enrollment and recognition steps against a session.

use anyhow::{anyhow, bail, Result};
use rollcall_client::load_image;
use rollcall_core::{
    present, DisplayModel, ImagePayload, RegistrationForm, Route, SessionHandle, SlotState, Snapshot,
    WorkflowState, ENROLLMENT_SLOTS,
};
use std::path::PathBuf;

/// Next candidate that passes local preflight. Unusable files are skipped.
fn next_candidate(candidates: &mut impl Iterator<Item = PathBuf>) -> Option<(PathBuf, ImagePayload)> {
    for path in candidates.by_ref() {
        match load_image(&path) {
            Ok(preflight) => return Some((path, preflight.payload)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping candidate");
                eprintln!("Skipping {}: {e}", path.display());
            }
        }
    }
    None
}

fn settled(s: &Snapshot) -> bool {
    !s.state.is_busy()
}

/// Register `form`, then fill all enrollment slots from `candidates` in order.
///
/// A rejected image is replaced by the next candidate for the same slot. A
/// transport failure resubmits the same image up to `retries` times.
pub async fn enroll(
    session: &SessionHandle,
    form: RegistrationForm,
    candidates: Vec<PathBuf>,
    retries: u32,
) -> Result<DisplayModel> {
    session.submit_registration(form).await?;

    let mut candidates = candidates.into_iter();
    let mut retry: Option<(PathBuf, ImagePayload)> = None;
    let mut transient_failures = 0u32;

    loop {
        let snapshot = session.snapshot();
        let slot = match &snapshot.state {
            WorkflowState::Enrolling(seq) => seq.current_index(),
            WorkflowState::ShowingResults(_) => break,
            other => bail!("enrollment left the capture step ({})", other.name()),
        };

        let (path, image) = match retry.take() {
            Some(candidate) => candidate,
            None => next_candidate(&mut candidates)
                .ok_or_else(|| anyhow!("ran out of images for slot {} of {ENROLLMENT_SLOTS}", slot + 1))?,
        };
        println!("Uploading image {}/{ENROLLMENT_SLOTS}: {}", slot + 1, path.display());
        session.submit_image(image.clone()).await?;

        let snapshot = session.wait_for(settled).await?;
        let WorkflowState::Enrolling(seq) = &snapshot.state else {
            bail!("enrollment left the capture step ({})", snapshot.state.name());
        };
        match seq.progress().slot(slot) {
            Some(SlotState::Uploaded(_)) => {
                if let Some(notice) = seq.notice() {
                    println!("{notice}");
                }
                transient_failures = 0;
                // Advance (or completion) follows after a delay.
                session
                    .wait_for(|s| match &s.state {
                        WorkflowState::Enrolling(seq) => seq.current_index() != slot,
                        _ => true,
                    })
                    .await?;
            }
            Some(SlotState::Failed(failure)) if failure.is_transient() => {
                if transient_failures >= retries {
                    bail!("{failure} (gave up after {} attempts)", transient_failures + 1);
                }
                transient_failures += 1;
                eprintln!("Image {}: {failure} Retrying...", slot + 1);
                retry = Some((path, image));
            }
            Some(SlotState::Failed(failure)) => {
                eprintln!("Image {} rejected: {failure}", slot + 1);
                transient_failures = 0;
            }
            other => bail!("slot {} did not settle: {other:?}", slot + 1),
        }
    }

    results(session).await
}

/// Submit one group photo, resubmitting on transport failures up to `retries` times.
pub async fn recognize(
    session: &SessionHandle,
    photo: PathBuf,
    division: Option<String>,
    retries: u32,
) -> Result<DisplayModel> {
    let image = load_image(&photo)?.payload;
    session.navigate(Route::GroupRecognition).await?;
    session.select_group_photo(image, division).await?;

    let mut attempts = 0u32;
    loop {
        session.submit_group_photo().await?;
        let snapshot = session.wait_for(settled).await?;
        match &snapshot.state {
            WorkflowState::ShowingResults(payload) => return Ok(present(payload)),
            WorkflowState::RecognizingGroup(submitter) => match submitter.error() {
                Some(failure) if failure.is_transient() && attempts < retries => {
                    attempts += 1;
                    eprintln!("{failure} Retrying...");
                }
                Some(failure) => bail!("{failure}"),
                None => bail!("recognition settled without a result"),
            },
            other => bail!("recognition left the group step ({})", other.name()),
        }
    }
}

async fn results(session: &SessionHandle) -> Result<DisplayModel> {
    let snapshot = session
        .wait_for(|s| matches!(s.state, WorkflowState::ShowingResults(_)))
        .await?;
    match &snapshot.state {
        WorkflowState::ShowingResults(payload) => Ok(present(payload)),
        other => bail!("no results to show ({})", other.name()),
    }
}
