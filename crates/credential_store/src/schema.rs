use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Storage key the browser build used for the credential blob; kept as the default
/// file stem so existing exports stay recognizable.
pub const CREDENTIAL_STORAGE_KEY: &str = "gmail_user_info";

/// Mailbox authorization persisted between launches.
///
/// `expires_at` and `created_at` are epoch milliseconds. The JSON shape uses
/// camelCase keys (`accessToken`, `refreshToken`, `expiresAt`, ...).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Credential {
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        email: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            email: email.into(),
            name: None,
            picture: None,
            expires_at,
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, name: Option<String>, picture: Option<String>) -> Self {
        self.name = name;
        self.picture = picture;
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Required fields are non-empty and expiry is strictly after `now_ms`.
    #[must_use]
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        !self.access_token.is_empty()
            && !self.refresh_token.is_empty()
            && !self.email.is_empty()
            && self.expires_at > 0
            && now_ms < self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("picture", &self.picture)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Reason a persisted record was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRejection {
    Malformed(String),
    MissingField(&'static str),
    InvalidExpiry,
    Expired { expires_at: i64 },
}

impl fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(message) => write!(f, "record is not valid JSON: {message}"),
            Self::MissingField(field) => write!(f, "required field '{field}' is missing or empty"),
            Self::InvalidExpiry => write!(f, "expiresAt is not a positive number"),
            Self::Expired { expires_at } => write!(f, "credential expired at {expires_at}"),
        }
    }
}

/// Parses and validates a persisted credential blob against `now_ms`.
pub fn validate_record(raw: &str, now_ms: i64) -> Result<Credential, RecordRejection> {
    let value: Value =
        serde_json::from_str(raw).map_err(|error| RecordRejection::Malformed(error.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(RecordRejection::Malformed(
            "top-level value must be an object".to_string(),
        ));
    };

    let access_token = required_string(&fields, "accessToken")?;
    let refresh_token = required_string(&fields, "refreshToken")?;
    let email = required_string(&fields, "email")?;
    let expires_at =
        positive_millis(fields.get("expiresAt")).ok_or(RecordRejection::InvalidExpiry)?;

    if now_ms >= expires_at {
        return Err(RecordRejection::Expired { expires_at });
    }

    Ok(Credential {
        access_token,
        refresh_token,
        email,
        name: optional_string(&fields, "name"),
        picture: optional_string(&fields, "picture"),
        expires_at,
        created_at: positive_millis(fields.get("createdAt")),
    })
}

fn required_string(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<String, RecordRejection> {
    match fields.get(key).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(RecordRejection::MissingField(key)),
    }
}

fn optional_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn positive_millis(value: Option<&Value>) -> Option<i64> {
    let number = value?.as_f64()?;
    if !number.is_finite() || number <= 0.0 || number >= i64::MAX as f64 {
        return None;
    }

    Some(number as i64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn record(overrides: Value) -> String {
        let mut base = json!({
            "accessToken": "t1",
            "refreshToken": "r1",
            "email": "a@b.com",
            "expiresAt": NOW + 60_000,
        });
        if let (Some(base), Some(overrides)) = (base.as_object_mut(), overrides.as_object()) {
            for (key, value) in overrides {
                base.insert(key.clone(), value.clone());
            }
        }
        base.to_string()
    }

    #[test]
    fn accepts_complete_unexpired_record() {
        let credential = validate_record(&record(json!({})), NOW).expect("record should be valid");

        assert_eq!(credential.email, "a@b.com");
        assert_eq!(credential.expires_at, NOW + 60_000);
        assert!(credential.is_valid_at(NOW));
        assert_eq!(credential.name, None);
    }

    #[test]
    fn keeps_optional_profile_metadata() {
        let raw = record(json!({
            "name": "Ada",
            "picture": "https://example.com/a.png",
            "createdAt": NOW - 5,
        }));

        let credential = validate_record(&raw, NOW).expect("record should be valid");
        assert_eq!(credential.name.as_deref(), Some("Ada"));
        assert_eq!(credential.picture.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(credential.created_at, Some(NOW - 5));
    }

    #[test]
    fn rejects_missing_or_empty_required_fields() {
        for key in ["accessToken", "refreshToken", "email"] {
            let raw = record(json!({ key: "" }));
            assert_eq!(
                validate_record(&raw, NOW),
                Err(RecordRejection::MissingField(key))
            );

            let raw = record(json!({ key: null }));
            assert_eq!(
                validate_record(&raw, NOW),
                Err(RecordRejection::MissingField(key))
            );
        }
    }

    #[test]
    fn rejects_non_numeric_zero_and_negative_expiry() {
        for expiry in [json!("soon"), json!(0), json!(-10), json!(null), json!(true)] {
            let raw = record(json!({ "expiresAt": expiry }));
            assert_eq!(validate_record(&raw, NOW), Err(RecordRejection::InvalidExpiry));
        }
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let raw = record(json!({ "expiresAt": NOW }));
        assert_eq!(
            validate_record(&raw, NOW),
            Err(RecordRejection::Expired { expires_at: NOW })
        );
        assert!(validate_record(&raw, NOW - 1).is_ok());
    }

    #[test]
    fn rejects_invalid_json_and_non_object_payloads() {
        assert!(matches!(
            validate_record("{not json", NOW),
            Err(RecordRejection::Malformed(_))
        ));
        assert!(matches!(
            validate_record("[1,2,3]", NOW),
            Err(RecordRejection::Malformed(_))
        ));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let credential = Credential::new("secret-access", "secret-refresh", "a@b.com", NOW);
        let rendered = format!("{credential:?}");

        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("a@b.com"));
    }

    #[test]
    fn serialized_shape_uses_camel_case_keys() {
        let credential = Credential::new("t1", "r1", "a@b.com", NOW).with_created_at(NOW - 1);
        let value = serde_json::to_value(&credential).expect("credential should serialize");

        assert_eq!(value["accessToken"], "t1");
        assert_eq!(value["refreshToken"], "r1");
        assert_eq!(value["expiresAt"], NOW);
        assert_eq!(value["createdAt"], NOW - 1);
        assert!(value.get("name").is_none());
    }
}
