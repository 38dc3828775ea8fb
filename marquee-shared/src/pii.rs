use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps personal data (emails, names) so `tracing` fields and `{:?}` never
/// print it in full. Serialization still emits the real value because API
/// responses and stored rows need it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask(self.0.as_ref()))
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask(self.0.as_ref()))
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// `jane@example.com` -> `j***@example.com`, anything else -> `********`.
fn mask(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        _ => "********".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_masked_in_logs() {
        let email = Masked("jane@example.com".to_string());
        assert_eq!(format!("{:?}", email), "j***@example.com");
        assert_eq!(email.to_string(), "j***@example.com");
    }

    #[test]
    fn test_non_email_is_fully_masked() {
        assert_eq!(Masked("Jane Doe").to_string(), "********");
    }

    #[test]
    fn test_serialization_keeps_real_value() {
        let json = serde_json::to_string(&Masked("jane@example.com")).unwrap();
        assert_eq!(json, "\"jane@example.com\"");
    }
}
