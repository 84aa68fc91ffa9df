//! [`GestureClassifier`] – the seam between the controller and the vision model.
//!
//! The edge controller never inspects pixels itself. It hands decoded frame
//! bytes to a classifier backend and acts on the returned
//! [`Gesture`][kennel_types::Gesture] label.

use async_trait::async_trait;
use thiserror::Error;

use kennel_types::Gesture;

/// Errors that can arise from gesture classification.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The HTTP request to the vision service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response from the vision service could not be interpreted.
    #[error("unexpected classifier response: {0}")]
    BadResponse(String),
}

/// A vision backend that labels one camera frame with a [`Gesture`].
///
/// # Contract
///
/// * `classify` receives raw, already base64-decoded image bytes and returns
///   the gesture the frame shows. A frame showing no known gesture yields
///   [`Gesture::Unknown`], not an error; errors are reserved for the backend
///   itself failing.
///
/// * Implementations must tolerate concurrent calls: the dispatcher
///   classifies frames from different robots in parallel.
#[async_trait]
pub trait GestureClassifier: Send + Sync {
    /// Label `frame` with the gesture it shows.
    async fn classify(&self, frame: &[u8]) -> Result<Gesture, ClassifierError>;
}
