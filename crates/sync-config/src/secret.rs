use std::fmt;

/// A wrapper for sensitive values (bearer tokens) that redacts the value in
/// `Debug` and `Display` output to prevent accidental logging of
/// credentials.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// The secret value. Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Secret(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Secret(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_debug_and_display() {
        let secret = Secret::new("my-api-key-12345");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(format!("{}", secret), "***");
    }

    #[test]
    fn expose_returns_inner_value() {
        let secret = Secret::new("my-value");
        assert_eq!(secret.expose(), "my-value");
    }

    #[test]
    fn serde_round_trips_as_plain_string() {
        let secret = Secret::new("test-key");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"test-key\"");
        let back: Secret = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "test-key");
    }
}
