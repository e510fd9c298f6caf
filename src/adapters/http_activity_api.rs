//! HTTP implementation of the ActivityApi port.

use crate::domain::ActivityKind;
use crate::ports::activity_api::ActivityMutation;
use crate::ports::{ActivityApi, ActivitySnapshot, ApiError};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = concat!("hnav/", env!("CARGO_PKG_VERSION"));

pub struct HttpActivityApi {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpActivityApi {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn activity_url(&self, username: &str) -> String {
        format!("{}/activity/{}", self.base_url, username)
    }
}

/// Map a non-success status onto the retryable/terminal taxonomy.
pub(crate) fn status_error(status: StatusCode) -> Option<ApiError> {
    if status.is_success() {
        return None;
    }
    let code = status.as_u16();
    Some(match code {
        401 | 403 => ApiError::Unauthorized,
        429 | 500..=599 => ApiError::Server { status: code },
        _ => ApiError::Client { status: code },
    })
}

pub(crate) fn network_error(e: reqwest::Error) -> ApiError {
    ApiError::Network(e.to_string())
}

#[async_trait(?Send)]
impl ActivityApi for HttpActivityApi {
    async fn fetch(&self, username: &str) -> Result<ActivitySnapshot, ApiError> {
        let url = self.activity_url(username);
        debug!(url = %url, "fetching activity");

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(network_error)?;

        if let Some(err) = status_error(response.status()) {
            return Err(err);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn set(
        &self,
        item_id: &str,
        kind: ActivityKind,
        state: bool,
        auth: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}/activity", self.base_url);
        let body = ActivityMutation {
            item_id,
            kind: kind.as_str(),
            state,
            auth,
        };
        debug!(url = %url, item_id = %item_id, %kind, state, "sending activity mutation");

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        match status_error(response.status()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_error_classes() {
        assert_eq!(status_error(StatusCode::OK), None);
        assert_eq!(status_error(StatusCode::NO_CONTENT), None);
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED),
            Some(ApiError::Unauthorized)
        );
        assert_eq!(status_error(StatusCode::FORBIDDEN), Some(ApiError::Unauthorized));
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            Some(ApiError::Server { status: 429 })
        );
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY),
            Some(ApiError::Server { status: 502 })
        );
        assert_eq!(
            status_error(StatusCode::NOT_FOUND),
            Some(ApiError::Client { status: 404 })
        );
    }

    #[test]
    fn retryability_follows_status_class() {
        let retryable = |s| status_error(s).is_some_and(|e| e.is_retryable());
        assert!(retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!retryable(StatusCode::UNAUTHORIZED));
        assert!(!retryable(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let api = HttpActivityApi::new("https://worker.example/", Duration::from_secs(1));
        assert_eq!(api.activity_url("pg"), "https://worker.example/activity/pg");
    }

    #[test]
    fn mutation_body_shape() {
        let body = ActivityMutation {
            item_id: "42",
            kind: ActivityKind::FlagComment.as_str(),
            state: true,
            auth: "tok",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "item_id": "42",
                "kind": "flag_comment",
                "state": true,
                "auth": "tok"
            })
        );
    }
}
