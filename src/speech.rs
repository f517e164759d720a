//! Speech I/O event contract and outbound collaborator traits.
//!
//! The capture device and the synthesis driver live outside this crate;
//! only their event contract matters here. Inbound events are delivered to
//! the engine as [`SpeechEvent`]s, outbound commands go through the
//! [`SpeechOutput`] and [`SpeechInput`] traits.

/// Inbound event from the speech capture adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Capture started on the device.
    CaptureStarted,
    /// Capture ended (user stop, silence stop, or device stop).
    CaptureEnded,
    /// A final transcription for the current capture.
    Result(String),
    /// An interim transcription; resets the silence timer.
    PartialResult(String),
    /// Device or permission error, with an adapter-specific code.
    Error(String),
}

/// Outbound speech synthesis command surface.
///
/// Implementations cancel any in-progress utterance before speaking the new
/// one.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str);
}

/// Outbound capture control surface.
pub trait SpeechInput: Send + Sync {
    fn start_capture(&self);
    fn stop_capture(&self);
}

/// Directs the UI to a named screen with optional parameters.
pub trait Navigator: Send + Sync {
    fn go_to(&self, screen: &str, params: Option<serde_json::Value>);
}

/// No-op speech output for headless or test use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSpeech;

impl SpeechOutput for NullSpeech {
    fn speak(&self, _text: &str) {}
}

impl SpeechInput for NullSpeech {
    fn start_capture(&self) {}
    fn stop_capture(&self) {}
}

impl Navigator for NullSpeech {
    fn go_to(&self, _screen: &str, _params: Option<serde_json::Value>) {}
}
