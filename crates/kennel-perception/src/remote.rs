//! [`HttpClassifier`] – HTTP client for a remote vision service.
//!
//! Posts one camera frame per request to a service exposing
//! `POST /v1/classify` and maps the returned class index onto a
//! [`Gesture`] via [`Gesture::from_label`]; anything the service returns
//! outside the known range collapses to [`Gesture::Unknown`].

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use kennel_types::Gesture;

use crate::classifier::{ClassifierError, GestureClassifier};

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: i64,
}

/// Collapse any index the catalog does not know onto [`Gesture::Unknown`].
fn label_to_gesture(label: i64) -> Gesture {
    let label = u8::try_from(label).unwrap_or(0);
    Gesture::from_label(label)
}

// ─────────────────────────────────────────────────────────────────────────────
// HttpClassifier
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for a gesture-classification endpoint.
///
/// Construct once and reuse across dispatches; the underlying
/// [`reqwest::Client`] pools connections to the vision service.
pub struct HttpClassifier {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpClassifier {
    /// Create a classifier pointing at `base_url`
    /// (e.g. `"http://localhost:8502"`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Ping the vision service's health endpoint.
    ///
    /// Called once at startup so a misconfigured URL surfaces before the
    /// first robot event does.
    pub async fn probe(&self) -> Result<(), ClassifierError> {
        let url = format!("{}/healthz", self.base_url);
        self.client.get(&url).send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl GestureClassifier for HttpClassifier {
    /// Send `frame` to the service and return the labeled gesture.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::Http`] if the request fails or the service
    /// answers with a non-success status.
    async fn classify(&self, frame: &[u8]) -> Result<Gesture, ClassifierError> {
        let url = format!("{}/v1/classify", self.base_url);
        let image = STANDARD.encode(frame);
        let body = ClassifyRequest { image: &image };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response: ClassifyResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let gesture = label_to_gesture(response.label);
        debug!(label = response.label, gesture = ?gesture, "frame classified");
        Ok(gesture)
    }
}
