//! Client for the machine-health prediction service.
//!
//! # Architecture
//!
//! - [`PredictionClient`] - sends one [`Reading`] per call and returns the service's [`Diagnosis`]
//! - [`PredictConfig`] - endpoint, timeouts and [`RetryPolicy`]
//! - [`retry`] - the explicit retry extension point (off by default)
//!
//! # Wire format
//!
//! The reading is POSTed as JSON (`machine_id`, `air_temp`, `process_temp`,
//! `torque`, `tool_wear`, `rotational_speed`, `machine_type`). A success body
//! is decoded into a [`Diagnosis`] without further validation.
//!
//! # Error Handling
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Non-2xx with `{"detail": "..."}` | `Service` carrying the detail |
//! | Non-2xx with a list `detail` | `Service` carrying the joined `msg` entries |
//! | Non-2xx with anything else | `Service("Prediction failed")` |
//! | 2xx with `{"error": "..."}` and no prediction | `Service` carrying the error |
//! | 2xx that is not a JSON object | `MalformedResponse` |
//! | No response | `Unreachable` |

mod error;
pub mod retry;

use std::time::Duration;

use serde_json::Value;
use url::Url;
use uuid::Uuid;

pub use error::{PredictConfigError, PredictError};
pub use retry::{RetryConfig, RetryPolicy};
pub use sentinel_types;
use sentinel_types::{Diagnosis, Reading};

/// Endpoint of a locally running prediction service.
pub const DEFAULT_PREDICT_URL: &str = "http://localhost:8000/predict";

/// Message used when an error body carries no usable detail.
pub const GENERIC_FAILURE_MESSAGE: &str = "Prediction failed";

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Prediction endpoint plus transport tuning.
///
/// ```rust
/// use sentinel_predict::{PredictConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let config = PredictConfig::new("http://localhost:8000/predict")
///     .unwrap()
///     .with_request_timeout(Duration::from_secs(5))
///     .with_retry(RetryPolicy::Never);
/// # let _ = config;
/// ```
#[derive(Debug, Clone)]
pub struct PredictConfig {
    endpoint: Url,
    connect_timeout: Duration,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl PredictConfig {
    pub fn new(endpoint: &str) -> Result<Self, PredictConfigError> {
        let url = Url::parse(endpoint.trim()).map_err(|source| {
            PredictConfigError::InvalidEndpoint {
                raw: endpoint.to_string(),
                source,
            }
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PredictConfigError::UnsupportedScheme(
                url.scheme().to_string(),
            ));
        }

        Ok(Self {
            endpoint: url,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::Never,
        })
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn build_http_client(config: &PredictConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .build()
}

/// Sends readings to the prediction service.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    config: PredictConfig,
}

impl PredictionClient {
    pub fn new(config: PredictConfig) -> Result<Self, PredictConfigError> {
        let http = build_http_client(&config).map_err(PredictConfigError::HttpClient)?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &PredictConfig {
        &self.config
    }

    /// Submit one reading and return the service's diagnosis.
    ///
    /// Makes a single attempt unless the configured [`RetryPolicy`] says otherwise.
    pub async fn predict(&self, reading: &Reading) -> Result<Diagnosis, PredictError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(
            request_id = %request_id,
            machine_id = %reading.machine_id(),
            endpoint = %self.config.endpoint,
            "Sending prediction request"
        );

        let outcome = retry::send_with_policy(
            || {
                self.http
                    .post(self.config.endpoint.clone())
                    .header(REQUEST_ID_HEADER, &request_id)
                    .json(reading)
            },
            &self.config.retry,
        )
        .await;

        let response = match outcome {
            retry::SendOutcome::Response(response) => response,
            retry::SendOutcome::ConnectionError { attempts, source } => {
                tracing::warn!(
                    request_id = %request_id,
                    attempts,
                    error = %source,
                    "Prediction service unreachable"
                );
                return Err(PredictError::Unreachable { attempts, source });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            let message = extract_detail(&body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            tracing::warn!(
                request_id = %request_id,
                status = status.as_u16(),
                %message,
                "Prediction rejected"
            );
            return Err(PredictError::Service {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| PredictError::Unreachable {
                attempts: 1,
                source,
            })?;
        let diagnosis = decode_diagnosis(&body)?;
        tracing::info!(
            request_id = %request_id,
            prediction = diagnosis.prediction.as_deref().unwrap_or("<absent>"),
            "Prediction received"
        );
        Ok(diagnosis)
    }
}

async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            break;
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Pull a human-readable message out of an error body's `detail` field.
///
/// A string detail is returned as is; a list of validation errors is reduced
/// to its `msg` entries joined with `"; "`. Returns `None` when the body has
/// no usable detail.
#[must_use]
pub fn extract_detail(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;
    match payload.get("detail")? {
        Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(_) => item.get("msg").and_then(Value::as_str),
                    _ => None,
                })
                .filter(|msg| !msg.trim().is_empty())
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

/// Decode a success body.
pub fn decode_diagnosis(body: &[u8]) -> Result<Diagnosis, PredictError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PredictError::MalformedResponse(e.to_string()))?;
    let Value::Object(fields) = &value else {
        return Err(PredictError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    };

    if !fields.contains_key("prediction")
        && let Some(Value::String(error)) = fields.get("error")
    {
        return Err(PredictError::Service {
            status: None,
            message: error.clone(),
        });
    }

    serde_json::from_value(value).map_err(|e| PredictError::MalformedResponse(e.to_string()))
}
