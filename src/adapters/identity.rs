use crate::config::toml_config::IdentityConfig;
use crate::domain::model::VerifiedIdentity;
use crate::domain::ports::IdentityVerifier;
use crate::utils::error::{BookingError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Verifies Firebase phone-auth ID tokens through the Identity Toolkit
/// `accounts:lookup` endpoint.
pub struct FirebaseIdentity {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FirebaseIdentity {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    phone_number: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
struct LookupError {
    error: LookupErrorBody,
}

#[derive(Debug, Deserialize)]
struct LookupErrorBody {
    message: Option<String>,
}

#[async_trait]
impl IdentityVerifier for FirebaseIdentity {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity> {
        if id_token.trim().is_empty() {
            return Err(BookingError::unauthorized("Missing ID token"));
        }

        let response = self
            .client
            .post(format!("{}/v1/accounts:lookup", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<LookupError>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| status.to_string());

            // 400 代表 token 無效或過期，其餘視為平台錯誤
            if status.is_client_error() {
                tracing::info!("Rejected ID token: {}", message);
                return Err(BookingError::unauthorized(message));
            }
            return Err(BookingError::PlatformError {
                status: status.as_u16(),
                code: "IDENTITY_LOOKUP_FAILED".to_string(),
                detail: message,
            });
        }

        let lookup: LookupResponse = response.json().await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::unauthorized("Unknown user"))?;

        if user.disabled {
            return Err(BookingError::unauthorized("Account disabled"));
        }

        let phone_number = user
            .phone_number
            .ok_or_else(|| BookingError::unauthorized("Account has no verified phone number"))?;

        Ok(VerifiedIdentity {
            uid: user.local_id,
            phone_number,
        })
    }
}
