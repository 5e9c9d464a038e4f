//! Librarian accounts: login, library registration, logout and the stored profile.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use shared::protocol::{LoginRequest, RegisterLibrary, RegisterLibraryRequest, RegisterUser};
use tracing::info;

use crate::{
    api::CatalogApi,
    error::ClientError,
    session::Session,
};

const COUNTRY_CODE: &str = "998";
const PHONE_DIGITS: usize = 12;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_ADDRESS: &str = "Not specified";

fn phone_digits(input: &str) -> String {
    let mut digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if !digits.starts_with(COUNTRY_CODE) {
        digits.insert_str(0, COUNTRY_CODE);
    }
    digits.truncate(PHONE_DIGITS);
    digits
}

/// Formats any phone input as `+998 XX XXX XX XX`, dropping non-digits and
/// anything past twelve digits.
pub fn format_phone(input: &str) -> String {
    let digits = phone_digits(input);
    let local = &digits[COUNTRY_CODE.len()..];
    let mut formatted = format!("+{COUNTRY_CODE}");
    for (start, end) in [(0, 2), (2, 5), (5, 7), (7, 9)] {
        if local.len() <= start {
            break;
        }
        formatted.push(' ');
        formatted.push_str(&local[start..end.min(local.len())]);
    }
    formatted
}

/// Wire form: `+998XXXXXXXXX`.
pub fn clean_phone(input: &str) -> String {
    format!("+{}", phone_digits(input))
}

/// True when the input carries digits past the country code.
fn has_subscriber_number(input: &str) -> bool {
    phone_digits(input).len() > COUNTRY_CODE.len()
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub phone: String,
    pub password: String,
    pub instagram: String,
    pub facebook: String,
    pub telegram: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().is_empty() || !has_subscriber_number(&self.phone) || self.password.is_empty()
        {
            return Err(ClientError::Validation(
                "name, phone and password are required".to_string(),
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    fn social_media(&self) -> Map<String, Value> {
        [
            ("instagram", &self.instagram),
            ("facebook", &self.facebook),
            ("telegram", &self.telegram),
        ]
        .into_iter()
        .filter_map(|(network, handle)| {
            let handle = handle.trim();
            (!handle.is_empty()).then(|| (network.to_string(), Value::String(handle.to_string())))
        })
        .collect()
    }

    pub fn to_request(&self) -> RegisterLibraryRequest {
        RegisterLibraryRequest {
            user: RegisterUser {
                password: self.password.clone(),
                name: self.name.trim().to_string(),
                phone: clean_phone(&self.phone),
            },
            library: RegisterLibrary {
                address: DEFAULT_ADDRESS.to_string(),
                social_media: self.social_media(),
                can_rent_books: false,
                latitude: "0".to_string(),
                longitude: "0".to_string(),
            },
        }
    }
}

/// Replaces a body-less rejection with a fallback message.
fn with_fallback(err: ClientError, fallback: &str) -> ClientError {
    match err {
        ClientError::ServerRejected {
            status,
            message: None,
        } => ClientError::ServerRejected {
            status,
            message: Some(fallback.to_string()),
        },
        other => other,
    }
}

pub struct AuthService {
    api: Arc<CatalogApi>,
}

impl AuthService {
    pub fn new(api: Arc<CatalogApi>) -> Self {
        Self { api }
    }

    pub async fn login(&self, phone: &str, password: &str) -> Result<Session, ClientError> {
        if !has_subscriber_number(phone) || password.is_empty() {
            return Err(ClientError::Validation(
                "phone and password are required".to_string(),
            ));
        }
        let phone = clean_phone(phone);
        let response = self
            .api
            .login(&LoginRequest {
                phone: phone.clone(),
                password: password.to_string(),
            })
            .await
            .map_err(|err| with_fallback(err, "login failed"))?;

        let session = Session {
            access_token: response.access,
            refresh_token: response.refresh,
            user: response.user.unwrap_or_else(|| json!({ "phone": phone })),
        };
        self.store(&session).await?;
        info!(%phone, "librarian logged in");
        Ok(session)
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<Session, ClientError> {
        form.validate()?;
        let response = self
            .api
            .register_library(&form.to_request())
            .await
            .map_err(|err| with_fallback(err, "signup failed"))?;

        let access_token = match (&response.access, response.id) {
            (Some(access), _) => access.clone(),
            (None, Some(id)) => format!("authenticated_{id}"),
            (None, None) => {
                return Err(ClientError::Network(
                    "signup response carried neither a token nor an id".to_string(),
                ))
            }
        };
        let session = Session {
            access_token,
            refresh_token: response.refresh.clone(),
            user: serde_json::to_value(&response).unwrap_or(Value::Null),
        };
        self.store(&session).await?;
        info!(id = ?response.id, "library registered");
        Ok(session)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.api
            .session()
            .clear()
            .await
            .map_err(ClientError::Storage)?;
        info!("librarian logged out");
        Ok(())
    }

    /// The user descriptor saved at login, if signed in.
    pub async fn profile(&self) -> Result<Option<Value>, ClientError> {
        let session = self
            .api
            .session()
            .session()
            .await
            .map_err(ClientError::Storage)?;
        Ok(session.map(|session| session.user))
    }

    async fn store(&self, session: &Session) -> Result<(), ClientError> {
        self.api
            .session()
            .set(
                &session.access_token,
                session.refresh_token.as_deref(),
                &session.user,
            )
            .await
            .map_err(ClientError::Storage)
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
