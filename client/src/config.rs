//! Verification service settings loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

/// Service address used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Upper bound on any single request to the verification service.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while validating settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The base URL does not parse.
    #[error("invalid base URL `{value}`: {message}")]
    InvalidBaseUrl {
        /// Configured value.
        value: String,
        /// Parser diagnostic.
        message: String,
    },
    /// The base URL uses a scheme other than HTTP(S).
    #[error("base URL `{value}` must use http or https")]
    UnsupportedScheme {
        /// Configured value.
        value: String,
    },
}

/// Settings for reaching the verification service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "VERIFY")]
pub struct GatewaySettings {
    /// Base URL the service endpoints are resolved against.
    #[ortho_config(default = DEFAULT_BASE_URL.to_owned())]
    pub base_url: String,
}

impl GatewaySettings {
    /// Return the configured base URL, falling back to the default.
    ///
    /// The returned URL always ends with `/` so endpoint paths append to it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the value is not an absolute HTTP(S) URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.base_url.trim();
        let raw = if trimmed.is_empty() {
            DEFAULT_BASE_URL
        } else {
            trimmed
        };
        let mut url = Url::parse(raw).map_err(|err| ConfigError::InvalidBaseUrl {
            value: raw.to_owned(),
            message: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                value: raw.to_owned(),
            });
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for gateway configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    fn load_from_empty_args() -> GatewaySettings {
        GatewaySettings::load_from_iter([OsString::from("verify-identity")])
            .expect("config should load")
    }

    fn settings(base_url: &str) -> GatewaySettings {
        GatewaySettings {
            base_url: base_url.to_owned(),
        }
    }

    #[rstest]
    fn default_base_url_is_used_when_missing() {
        let _guard = lock_env([("VERIFY_BASE_URL", None::<String>)]);

        let loaded = load_from_empty_args();
        assert_eq!(loaded.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            loaded.base_url().expect("default parses").as_str(),
            "http://localhost:8000/"
        );
    }

    #[rstest]
    fn environment_override_is_respected() {
        let _guard = lock_env([(
            "VERIFY_BASE_URL",
            Some("https://kyc.example/v1".to_owned()),
        )]);

        let loaded = load_from_empty_args();
        assert_eq!(
            loaded.base_url().expect("override parses").as_str(),
            "https://kyc.example/v1/"
        );
    }

    #[rstest]
    #[case("   ", "http://localhost:8000/")]
    #[case("http://10.0.0.5:9000", "http://10.0.0.5:9000/")]
    #[case("https://kyc.example/api/", "https://kyc.example/api/")]
    fn base_url_is_normalised(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(
            settings(raw).base_url().expect("valid url").as_str(),
            expected
        );
    }

    #[rstest]
    fn relative_url_is_rejected() {
        let err = settings("kyc.example/api").base_url().expect_err("relative");
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[rstest]
    fn non_http_scheme_is_rejected() {
        let err = settings("ftp://kyc.example").base_url().expect_err("ftp");
        assert_eq!(
            err,
            ConfigError::UnsupportedScheme {
                value: "ftp://kyc.example".to_owned()
            }
        );
    }
}
