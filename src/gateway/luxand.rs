use super::{Candidate, GatewayError, Registration, Verification, decode_image};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("school-attendance/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Rectangle {
    top: f64,
    left: f64,
    bottom: f64,
    right: f64,
}

#[derive(Debug, Deserialize)]
struct SearchMatch {
    name: String,
    probability: f64,
    rectangle: Rectangle,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    status: Option<String>,
    probability: f64,
}

fn id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_candidates(matches: Vec<SearchMatch>) -> Vec<Candidate> {
    matches
        .into_iter()
        .map(|m| Candidate {
            student_id: m.name,
            confidence: m.probability,
            bbox: [
                m.rectangle.left,
                m.rectangle.top,
                m.rectangle.right - m.rectangle.left,
                m.rectangle.bottom - m.rectangle.top,
            ],
        })
        .collect()
}

/// Client for the Luxand cloud API.
#[derive(Clone)]
pub struct LuxandClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl LuxandClient {
    pub fn new(base_url: String, token: Option<String>) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str, GatewayError> {
        self.token.as_deref().ok_or(GatewayError::NotConfigured)
    }

    fn photo_form(image: &str, file_name: &'static str) -> Result<Form, GatewayError> {
        let part = Part::bytes(decode_image(image)?)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| GatewayError::InvalidImage(e.to_string()))?;
        Ok(Form::new().part("photo", part))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(status.as_u16(), body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Searches every face in the image against registered subjects.
    pub async fn recognize(&self, image: &str) -> Result<Vec<Candidate>, GatewayError> {
        let token = self.token()?;
        let form = Self::photo_form(image, "query.jpg")?;

        let response = self
            .http_client
            .post(format!("{}/photo/search", self.base_url))
            .header("token", token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let matches: Vec<SearchMatch> = Self::read_json(response).await?;
        let candidates = to_candidates(matches);
        debug!(matches = candidates.len(), "Recognition search finished");
        Ok(candidates)
    }

    /// Creates a subject named after the student and attaches one face.
    pub async fn register_person(&self, name: &str, image: &str) -> Result<Registration, GatewayError> {
        let token = self.token()?;
        let form = Self::photo_form(image, "face.jpg")?;

        let response = self
            .http_client
            .post(format!("{}/subject", self.base_url))
            .header("token", token)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let subject: Created = Self::read_json(response).await?;
        let person_id = id_string(&subject.id);

        let response = self
            .http_client
            .post(format!("{}/subject/{}", self.base_url, person_id))
            .header("token", token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let face: Created = Self::read_json(response).await?;

        info!(person_id = %person_id, "Registered face with recognition service");

        Ok(Registration {
            person_id,
            face_id: id_string(&face.id),
            confidence: 1.0,
        })
    }

    pub async fn verify(&self, person_id: &str, image: &str) -> Result<Verification, GatewayError> {
        let token = self.token()?;
        let form = Self::photo_form(image, "verify.jpg")?;

        let response = self
            .http_client
            .post(format!("{}/photo/verify/{}", self.base_url, person_id))
            .header("token", token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let verdict: VerifyResponse = Self::read_json(response).await?;

        Ok(Verification {
            matched: verdict.status.as_deref() == Some("success"),
            probability: verdict.probability,
        })
    }
}
