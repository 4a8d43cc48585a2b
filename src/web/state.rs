//! Shared application state handed to every handler.

use std::sync::Arc;

use chrono::Duration;

use crate::adapters::{FirebaseIdentity, SquareClient};
use crate::config::AppConfig;
use crate::core::booking::BookingService;
use crate::core::sanitizer::HtmlSanitizer;
use crate::core::session::SessionStore;
use crate::domain::ports::{BookingPlatform, IdentityVerifier};
use crate::utils::error::Result;

pub struct AppState {
    pub config: AppConfig,
    pub platform: Arc<dyn BookingPlatform>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub sessions: SessionStore,
    pub bookings: BookingService,
    pub sanitizer: HtmlSanitizer,
}

impl AppState {
    /// Build state wired to Square and Firebase from configuration.
    pub fn new(config: AppConfig) -> Result<Arc<Self>> {
        let platform: Arc<dyn BookingPlatform> = Arc::new(SquareClient::new(&config.square)?);
        let identity: Arc<dyn IdentityVerifier> = Arc::new(FirebaseIdentity::new(&config.identity)?);
        Ok(Self::with_providers(config, platform, identity))
    }

    pub fn with_providers(
        config: AppConfig,
        platform: Arc<dyn BookingPlatform>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Arc<Self> {
        let sessions = SessionStore::new(Duration::minutes(config.server.session_ttl_minutes));
        let bookings = BookingService::new(platform.clone(), config.square.location_id.clone());

        Arc::new(Self {
            config,
            platform,
            identity,
            sessions,
            bookings,
            sanitizer: HtmlSanitizer::new(),
        })
    }
}
