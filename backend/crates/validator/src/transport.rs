//! Transport to the validation service

use keycodec::{DeactivateResponse, ValidateRequest, ValidateResponse};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::ValidatorConfig;
use crate::error::{TransportError, ValidatorResult};

/// One round-trip to the validation service.
///
/// Implementations report every failure to obtain a protocol answer as a
/// `TransportError`; rejections come back as `Ok` responses.
#[trait_variant::make(ValidationTransport: Send)]
pub trait LocalValidationTransport {
    async fn validate(&self, request: &ValidateRequest) -> Result<ValidateResponse, TransportError>;

    async fn deactivate(
        &self,
        request: &ValidateRequest,
    ) -> Result<DeactivateResponse, TransportError>;
}

/// HTTPS transport with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    validate_url: String,
    deactivate_url: String,
}

impl HttpTransport {
    pub fn new(config: &ValidatorConfig) -> ValidatorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("snow-flow/{}", config.client_version))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            validate_url: config.validate_url(),
            deactivate_url: config.deactivate_url(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        request: &ValidateRequest,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(classify)?;

        match response.status() {
            StatusCode::OK => response
                .json::<T>()
                .await
                .map_err(|e| TransportError::Decode(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(TransportError::RateLimited),
            status => Err(TransportError::Status(status.as_u16())),
        }
    }
}

impl ValidationTransport for HttpTransport {
    async fn validate(&self, request: &ValidateRequest) -> Result<ValidateResponse, TransportError> {
        self.post(&self.validate_url, request).await
    }

    async fn deactivate(
        &self,
        request: &ValidateRequest,
    ) -> Result<DeactivateResponse, TransportError> {
        self.post(&self.deactivate_url, request).await
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Connect(err.to_string())
    }
}
