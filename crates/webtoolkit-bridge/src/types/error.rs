//! Bridge error types. Every variant displays as the reason shown to the user.

use webtoolkit::ToolkitError;

/// Errors raised while coordinating captures and form fills.
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    /// The message channel to a page context failed.
    #[error("{0}")]
    Transport(String),

    #[error("Capturing is not enabled")]
    CaptureDisabled,

    #[error("No active tab found")]
    NoActiveTab,

    #[error("No tab with id {0}")]
    TabNotFound(u32),

    #[error("Failed to capture content")]
    ContentCaptureFailed,

    /// Content script unreachable and the tab cannot be injected into.
    #[error("Both content script and injection failed")]
    InjectionFailed,

    /// Content script unreachable and the injected capture failed.
    #[error("Both capture methods failed: {0}")]
    CaptureFailed(String),

    #[error("This page is not a Google Form")]
    NotAGoogleForm,

    #[error("Failed to inject GForm script")]
    FormInjectionFailed,

    #[error("Failed to access the Google Form page: {0}")]
    FormPageUnreachable(String),

    #[error("Failed to process Google Form")]
    FormProcessingFailed,

    /// A failure reported by a page context, passed through verbatim.
    #[error("{0}")]
    PageFailure(String),

    #[error("A {0} is already in progress")]
    Busy(&'static str),

    #[error("No quiz questions found in this form.")]
    NoQuestions,

    #[error("Found {0} question(s) but could not fill any. Check browser console (F12) for details.")]
    NothingFilled(usize),

    #[error("Could not detect answers. This form may not be a quiz or answers are not available.")]
    AnswersNotDetected,

    #[error("Could not detect answers. Injection timed out and script tag parsing failed.")]
    RelayTimedOut,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Toolkit(#[from] ToolkitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
