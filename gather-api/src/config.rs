//! API Configuration Module
//!
//! This module provides configuration for the HTTP server, rate limiting,
//! and outbound mail. Configuration is loaded from environment variables
//! with sensible defaults for development.

use std::time::Duration;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the server, rate limiting, and mail delivery.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Server Configuration
    // ========================================================================
    /// Bind host for the HTTP listener.
    pub host: String,

    /// Bind port for the HTTP listener.
    pub port: u16,

    /// Deployment environment ("development", "staging", "production").
    pub env: String,

    /// Base URL of the frontend, used to build activation links.
    pub frontend_url: String,

    // ========================================================================
    // Rate Limiting Configuration
    // ========================================================================
    /// Whether rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Requests admitted per client per window.
    pub rate_limit_requests: u32,

    /// Window size for rate limiting.
    pub rate_limit_window: Duration,

    // ========================================================================
    // Mail Configuration
    // ========================================================================
    /// Sender address for transactional mail.
    pub mail_from: String,

    /// SendGrid API key. Empty disables outbound mail (dev mode).
    pub sendgrid_api_key: String,

    /// How long invitation tokens stay valid.
    pub invitation_expiry: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            env: "development".to_string(),
            frontend_url: "http://localhost:4000".to_string(),

            rate_limit_enabled: true,
            rate_limit_requests: 20,
            rate_limit_window: Duration::from_secs(5),

            mail_from: "no-reply@gather.local".to_string(),
            sendgrid_api_key: String::new(),
            invitation_expiry: Duration::from_secs(3 * 24 * 3600),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `GATHER_API_HOST`: Bind host (default: 0.0.0.0)
    /// - `GATHER_API_PORT`: Bind port (default: 8080)
    /// - `GATHER_ENV`: Deployment environment (default: development)
    /// - `GATHER_FRONTEND_URL`: Frontend base URL for activation links
    /// - `GATHER_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `GATHER_RATE_LIMIT_REQUESTS`: Requests per window per client (default: 20)
    /// - `GATHER_RATE_LIMIT_WINDOW_SECS`: Window size in seconds (default: 5)
    /// - `GATHER_MAIL_FROM`: Sender address for invitations
    /// - `GATHER_SENDGRID_API_KEY`: SendGrid API key (empty disables mail)
    /// - `GATHER_INVITATION_EXPIRY_HOURS`: Invitation validity (default: 72)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("GATHER_API_HOST").unwrap_or(defaults.host);
        let port = std::env::var("GATHER_API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);
        let env = std::env::var("GATHER_ENV").unwrap_or(defaults.env);
        let frontend_url = std::env::var("GATHER_FRONTEND_URL").unwrap_or(defaults.frontend_url);

        let rate_limit_enabled = std::env::var("GATHER_RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let rate_limit_requests = std::env::var("GATHER_RATE_LIMIT_REQUESTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.rate_limit_requests);

        let rate_limit_window = std::env::var("GATHER_RATE_LIMIT_WINDOW_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);

        let mail_from = std::env::var("GATHER_MAIL_FROM").unwrap_or(defaults.mail_from);
        let sendgrid_api_key = std::env::var("GATHER_SENDGRID_API_KEY").unwrap_or_default();

        let invitation_expiry = std::env::var("GATHER_INVITATION_EXPIRY_HOURS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(|hours| Duration::from_secs(hours * 3600))
            .unwrap_or(defaults.invitation_expiry);

        Self {
            host,
            port,
            env,
            frontend_url,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
            mail_from,
            sendgrid_api_key,
            invitation_expiry,
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// Bind address string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the activation link sent in invitation mail.
    pub fn activation_url(&self, plaintext_token: &str) -> String {
        format!("{}/confirm/{}", self.frontend_url, plaintext_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.rate_limit_enabled);
        assert_eq!(config.rate_limit_requests, 20);
        assert_eq!(config.rate_limit_window, Duration::from_secs(5));
        assert_eq!(config.invitation_expiry, Duration::from_secs(259200));
        assert!(!config.is_production());
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());

        config.env = "production".to_string();
        assert!(config.is_production());
    }

    #[test]
    fn test_activation_url() {
        let config = ApiConfig::default();
        assert_eq!(
            config.activation_url("tok-123"),
            "http://localhost:4000/confirm/tok-123"
        );
    }

    #[test]
    fn test_bind_addr() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }
}
