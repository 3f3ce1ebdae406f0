//! Credential lookup for the generative service
//!
//! The credential is read once, when the gateway is built. A missing value is
//! not an error here: the gateway reports it as a configuration error on its
//! first call, so commands that never reach the service still work.

use std::env;

/// Read a bearer credential from the named environment variable
///
/// Blank values count as missing.
pub fn credential_from_env(var_name: &str) -> Option<String> {
    match env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => {
            tracing::debug!("Using credential from {}", var_name);
            Some(value.trim().to_string())
        }
        _ => {
            tracing::debug!("No credential found in {}", var_name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent concurrent env var modifications
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_var<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = env::var(key).ok();

        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }

        let result = f();

        match original {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }

        result
    }

    #[test]
    fn test_credential_present() {
        with_env_var("AUTOCODE_TEST_KEY", Some("  gsk-123  "), || {
            assert_eq!(
                credential_from_env("AUTOCODE_TEST_KEY"),
                Some("gsk-123".to_string())
            );
        });
    }

    #[test]
    fn test_credential_blank_is_missing() {
        with_env_var("AUTOCODE_TEST_KEY", Some("   "), || {
            assert_eq!(credential_from_env("AUTOCODE_TEST_KEY"), None);
        });
    }

    #[test]
    fn test_credential_absent() {
        with_env_var("AUTOCODE_TEST_KEY", None, || {
            assert_eq!(credential_from_env("AUTOCODE_TEST_KEY"), None);
        });
    }
}
