//! Caption-service credential.
//!
//! The library never reads the environment on its own: the CLI calls
//! [`ApiKey::from_env`] once at startup and hands the key to
//! [`crate::service::GeminiCaptionService::new`].

use crate::error::PoseError;
use std::fmt;

/// Environment variables searched for a Gemini key, in order.
pub const API_KEY_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// An opaque API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key. Blank keys are rejected.
    pub fn new(key: impl Into<String>) -> Result<Self, PoseError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(PoseError::InvalidConfig("API key must not be blank".into()));
        }
        Ok(Self(key))
    }

    /// The first non-blank value among `vars`.
    pub fn from_env(vars: &[&str]) -> Result<Self, PoseError> {
        Self::from_lookup(vars, |var| std::env::var(var).ok())
    }

    /// Like [`ApiKey::from_env`] with a custom variable source.
    pub fn from_lookup(
        vars: &[&str],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, PoseError> {
        vars.iter()
            .filter_map(|var| lookup(var))
            .find_map(|value| Self::new(value).ok())
            .ok_or_else(|| PoseError::MissingCredential {
                vars: vars.iter().map(|v| v.to_string()).collect(),
            })
    }

    /// The secret itself, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn blank_key_rejected() {
        assert!(ApiKey::new("   ").is_err());
        assert_eq!(ApiKey::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn debug_is_redacted() {
        let key = ApiKey::new("super-secret").unwrap();
        assert!(!format!("{key:?}").contains("super-secret"));
    }

    #[test]
    fn lookup_order_and_blank_skipping() {
        let env: HashMap<&str, &str> =
            HashMap::from([("GOOGLE_API_KEY", " "), ("GEMINI_API_KEY", "from-gemini")]);
        let key = ApiKey::from_lookup(API_KEY_VARS, |v| env.get(v).map(|s| s.to_string())).unwrap();
        assert_eq!(key.expose(), "from-gemini");
    }

    #[test]
    fn missing_key_lists_variables() {
        let err = ApiKey::from_lookup(API_KEY_VARS, |_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No API key found. Set one of: GOOGLE_API_KEY, GEMINI_API_KEY"
        );
    }
}
