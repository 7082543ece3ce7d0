//! Routable locations of the workflow.

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Registration,
    FaceCapture,
    GroupRecognition,
    StudentResults,
    GroupResults,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Home,
        Route::Registration,
        Route::FaceCapture,
        Route::GroupRecognition,
        Route::StudentResults,
        Route::GroupResults,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Registration => "/registration",
            Route::FaceCapture => "/face-capture",
            Route::GroupRecognition => "/group-recognition",
            Route::StudentResults => "/student-results",
            Route::GroupResults => "/group-results",
        }
    }

    /// Parse a path; a trailing slash is tolerated.
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        Self::ALL.into_iter().find(|r| r.path() == normalized)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.path())
    }
}
