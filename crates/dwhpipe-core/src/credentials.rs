//! Static AWS credentials read from the environment

use crate::config::ConfigError;

/// Environment variable holding the access key id
pub const ACCESS_KEY_VAR: &str = "AWS_ACCESS_KEY";

/// Environment variable holding the secret access key
pub const SECRET_KEY_VAR: &str = "AWS_SECRET_KEY";

/// Environment variable holding the session token
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

/// Temporary AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
}

impl Credentials {
    /// Read all three values from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read all three values through `lookup`; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
        };

        Ok(Self {
            access_key: require(ACCESS_KEY_VAR)?,
            secret_key: require(SECRET_KEY_VAR)?,
            session_token: require(SESSION_TOKEN_VAR)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_reads_all_three_values() {
        let vars = env(&[
            (ACCESS_KEY_VAR, "AKIAEXAMPLE"),
            (SECRET_KEY_VAR, "secret"),
            (SESSION_TOKEN_VAR, "token"),
        ]);
        let creds = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(creds.access_key, "AKIAEXAMPLE");
        assert_eq!(creds.secret_key, "secret");
        assert_eq!(creds.session_token, "token");
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let vars = env(&[(ACCESS_KEY_VAR, "AKIAEXAMPLE"), (SECRET_KEY_VAR, "secret")]);
        let err = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        match err {
            ConfigError::MissingEnv(name) => assert_eq!(name, SESSION_TOKEN_VAR),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let vars = env(&[
            (ACCESS_KEY_VAR, ""),
            (SECRET_KEY_VAR, "secret"),
            (SESSION_TOKEN_VAR, "token"),
        ]);
        let err = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(name) if name == ACCESS_KEY_VAR));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials {
            access_key: "AKIAEXAMPLE".into(),
            secret_key: "very-secret".into(),
            session_token: "very-token".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("very-token"));
    }
}
