use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Number of face images collected for one enrolled identity.
pub const ENROLLMENT_SLOTS: usize = 5;

/// Index of the final enrollment slot.
pub const LAST_SLOT: usize = ENROLLMENT_SLOTS - 1;

/// Raw registration form input, exactly as the user typed it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub name: String,
    pub roll_no: String,
    pub class: String,
}

impl RegistrationForm {
    pub fn new(
        name: impl Into<String>,
        roll_no: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            roll_no: roll_no.into(),
            class: class.into(),
        }
    }

    /// Validate every field and produce an [`IdentityDraft`].
    ///
    /// All blank fields are reported together. Values are stored trimmed.
    pub fn validate(&self) -> Result<IdentityDraft, ValidationErrors> {
        let fields = [
            (DraftField::Name, &self.name),
            (DraftField::RollNo, &self.roll_no),
            (DraftField::Class, &self.class),
        ];

        let missing: Vec<DraftField> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();

        if !missing.is_empty() {
            return Err(ValidationErrors(missing));
        }

        Ok(IdentityDraft {
            name: self.name.trim().to_string(),
            roll_no: self.roll_no.trim().to_string(),
            class: self.class.trim().to_string(),
        })
    }
}

/// A registration form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Name,
    RollNo,
    Class,
}

impl DraftField {
    /// Inline guidance shown next to the field.
    pub fn message(self) -> &'static str {
        match self {
            DraftField::Name => "Name is required",
            DraftField::RollNo => "Roll No is required",
            DraftField::Class => "Class is required",
        }
    }
}

/// Per-field validation failures for a registration form. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<DraftField>);

impl ValidationErrors {
    pub fn fields(&self) -> &[DraftField] {
        &self.0
    }

    pub fn contains(&self, field: DraftField) -> bool {
        self.0.contains(&field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|field| field.message()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Identity metadata for a student being enrolled.
///
/// Only obtainable through [`RegistrationForm::validate`], so every field is
/// guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityDraft {
    name: String,
    roll_no: String,
    class: String,
}

impl IdentityDraft {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roll_no(&self) -> &str {
        &self.roll_no
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

/// An image ready to be sent to the backend.
#[derive(Clone)]
pub struct ImagePayload {
    pub file_name: String,
    /// MIME type sent with the multipart part (e.g. "image/jpeg").
    pub mime: String,
    pub data: Arc<[u8]>,
}

impl ImagePayload {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    /// Lightweight reference kept once the bytes have been uploaded.
    pub fn image_ref(&self) -> ImageRef {
        ImageRef {
            file_name: self.file_name.clone(),
            size: self.data.len(),
        }
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub file_name: String,
    pub size: usize,
}

/// Why an upload did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Refused before any network call (no image, no identity).
    Local,
    /// The server answered and declined; a different image is needed.
    Rejected,
    /// Network or server fault; the same image may succeed on retry.
    Transport,
}

/// A user-visible failure with its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transport
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// State of one enrollment slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum SlotState {
    #[default]
    Pending,
    Uploading,
    Uploaded(ImageRef),
    Failed(Failure),
}

impl SlotState {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, SlotState::Uploaded(_))
    }
}

/// Ordered state of the five enrollment slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrollmentProgress {
    slots: [SlotState; ENROLLMENT_SLOTS],
}

impl EnrollmentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[SlotState] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&SlotState> {
        self.slots.get(index)
    }

    /// Lowest-indexed slot that is not yet uploaded, `None` when all are.
    pub fn current(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.is_uploaded())
    }

    pub fn uploaded_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_uploaded()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded_count() == ENROLLMENT_SLOTS
    }

    pub(crate) fn set(&mut self, index: usize, state: SlotState) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = state;
        }
    }
}

/// A student matched in a group photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedIdentity {
    pub name: String,
    pub roll_no: String,
    pub class: String,
}

impl fmt::Display for RecognizedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Roll No: {}, Class: {})",
            self.name, self.roll_no, self.class
        )
    }
}

/// Matches returned by a successful recognition request. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecognitionResult {
    matches: Vec<RecognizedIdentity>,
}

impl RecognitionResult {
    pub fn new(matches: Vec<RecognizedIdentity>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[RecognizedIdentity] {
        &self.matches
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }
}

/// Which kind of completion the results step is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultsMode {
    EnrollmentComplete,
    RecognitionComplete,
}

/// Data carried by the results step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResultsPayload {
    EnrollmentComplete,
    RecognitionComplete(RecognitionResult),
}

impl ResultsPayload {
    pub fn mode(&self) -> ResultsMode {
        match self {
            ResultsPayload::EnrollmentComplete => ResultsMode::EnrollmentComplete,
            ResultsPayload::RecognitionComplete(_) => ResultsMode::RecognitionComplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_complete_form() {
        let draft = RegistrationForm::new("Asha", "12", "7B").validate().unwrap();
        assert_eq!(draft.name(), "Asha");
        assert_eq!(draft.roll_no(), "12");
        assert_eq!(draft.class(), "7B");
    }

    #[test]
    fn test_validate_trims_fields() {
        let draft = RegistrationForm::new("  Asha ", "12\n", " 7B").validate().unwrap();
        assert_eq!(draft.name(), "Asha");
        assert_eq!(draft.roll_no(), "12");
        assert_eq!(draft.class(), "7B");
    }

    #[test]
    fn test_validate_reports_every_blank_field() {
        let errors = RegistrationForm::new("", "   ", "7B").validate().unwrap_err();
        assert_eq!(errors.fields(), &[DraftField::Name, DraftField::RollNo]);
        assert!(!errors.contains(DraftField::Class));
        assert_eq!(errors.to_string(), "Name is required; Roll No is required");
    }

    #[test]
    fn test_progress_current_is_lowest_not_uploaded() {
        let mut progress = EnrollmentProgress::new();
        assert_eq!(progress.current(), Some(0));

        progress.set(0, SlotState::Uploaded(ImageRef::default()));
        progress.set(1, SlotState::Failed(Failure::new(FailureKind::Rejected, "blurry")));
        assert_eq!(progress.current(), Some(1));
        assert_eq!(progress.uploaded_count(), 1);

        for i in 1..ENROLLMENT_SLOTS {
            progress.set(i, SlotState::Uploaded(ImageRef::default()));
        }
        assert_eq!(progress.current(), None);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_progress_set_out_of_range_is_ignored() {
        let mut progress = EnrollmentProgress::new();
        progress.set(ENROLLMENT_SLOTS, SlotState::Uploading);
        assert!(progress.slots().iter().all(|s| *s == SlotState::Pending));
    }

    #[test]
    fn test_recognized_identity_display() {
        let who = RecognizedIdentity {
            name: "Bo".into(),
            roll_no: "9".into(),
            class: "5A".into(),
        };
        assert_eq!(who.to_string(), "Bo (Roll No: 9, Class: 5A)");
    }

    #[test]
    fn test_image_payload_debug_hides_bytes() {
        let image = ImagePayload::new("a.jpg", "image/jpeg", vec![0u8; 2048]);
        let debug = format!("{image:?}");
        assert!(debug.contains("bytes: 2048"));
        assert_eq!(image.image_ref().size, 2048);
    }
}
