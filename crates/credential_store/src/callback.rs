use url::form_urlencoded;

use crate::error::CallbackError;
use crate::schema::Credential;

/// Parameters handed back by the external authorization service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub email: Option<String>,
    pub expires_in: Option<String>,
}

impl CallbackParams {
    /// Parses a redirect query string, with or without the leading `?`.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(
            form_urlencoded::parse(query.as_bytes())
                .map(|(key, value)| (key.into_owned(), value.into_owned())),
        )
    }

    /// Builds from key/value pairs; unknown keys are ignored and the last value wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "access_token" => &mut params.access_token,
                "refresh_token" => &mut params.refresh_token,
                "email" => &mut params.email,
                "expires_in" => &mut params.expires_in,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }

    /// Converts to a credential expiring `expires_in` seconds after `now_ms`.
    pub fn into_credential(self, now_ms: i64) -> Result<Credential, CallbackError> {
        let mut missing = Vec::new();
        let access_token = take_required(self.access_token, "access_token", &mut missing);
        let refresh_token = take_required(self.refresh_token, "refresh_token", &mut missing);
        let email = take_required(self.email, "email", &mut missing);
        let expires_in = take_required(self.expires_in, "expires_in", &mut missing);

        let (Some(access_token), Some(refresh_token), Some(email), Some(expires_in)) =
            (access_token, refresh_token, email, expires_in)
        else {
            return Err(CallbackError::MissingParameters { missing });
        };

        let expires_at = expires_in
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|seconds| *seconds > 0)
            .and_then(|seconds| seconds.checked_mul(1000))
            .and_then(|millis| now_ms.checked_add(millis))
            .ok_or_else(|| CallbackError::InvalidExpiresIn {
                value: expires_in.clone(),
            })?;

        Ok(Credential::new(access_token, refresh_token, email, expires_at).with_created_at(now_ms))
    }
}

fn take_required(
    value: Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<String> {
    match value {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            missing.push(name);
            None
        }
    }
}
