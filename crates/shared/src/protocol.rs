use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Book, Library, LibraryDetail, LibraryId};

/// A list response: either a bare array or a `{ results, count }` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Collection<T> {
    Bare(Vec<T>),
    /// `count` may accompany `results`; records are counted client-side.
    Envelope { results: Option<Vec<T>> },
}

impl<T> Collection<T> {
    pub fn into_records(self) -> Vec<T> {
        match self {
            Self::Bare(records) => records,
            Self::Envelope { results } => results.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDetailEnvelope {
    pub results: LibraryDetailResults,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDetailResults {
    pub library: NestedLibrary,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub total_books: Option<u64>,
    #[serde(default)]
    pub books: Option<Vec<Book>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedLibrary {
    #[serde(default)]
    pub id: Option<LibraryId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub total_books: Option<u64>,
}

impl LibraryDetailEnvelope {
    /// Top-level `phone`, `is_active` and `total_books` take precedence over the
    /// nested library's own fields.
    pub fn into_detail(self, requested: LibraryId) -> LibraryDetail {
        let LibraryDetailResults {
            library,
            phone,
            is_active,
            total_books,
            books,
        } = self.results;

        LibraryDetail {
            library: Library {
                id: library.id.unwrap_or(requested),
                name: library.name,
                address: library.address,
                total_books: total_books.or(library.total_books).unwrap_or_default(),
                is_active: is_active.or(library.is_active).unwrap_or(false),
                phone: phone.or(library.phone),
                email: library.email,
                image: library.image,
            },
            books: books.unwrap_or_default(),
            count: self.count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterLibraryRequest {
    pub user: RegisterUser,
    pub library: RegisterLibrary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub password: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterLibrary {
    pub address: String,
    pub social_media: Map<String, Value>,
    pub can_rent_books: bool,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterLibraryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Extracts a human-readable message from a non-2xx response body.
///
/// Checks `detail`, then `message`, then the `user` / `library` field-error maps
/// that the registration endpoint returns, then any remaining top-level map.
pub fn server_message(body: &Value) -> Option<String> {
    match body {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Object(map) => {
            for key in ["detail", "message", "error"] {
                if let Some(Value::String(text)) = map.get(key) {
                    return Some(text.clone());
                }
            }
            for key in ["user", "library"] {
                if let Some(Value::Object(fields)) = map.get(key) {
                    if let Some(joined) = join_field_errors(fields) {
                        return Some(joined);
                    }
                }
            }
            join_field_errors(map)
        }
        _ => None,
    }
}

fn join_field_errors(fields: &Map<String, Value>) -> Option<String> {
    let parts: Vec<String> = fields
        .iter()
        .map(|(field, value)| format!("{field}: {}", flatten_messages(value)))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn flatten_messages(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_messages)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => join_field_errors(map).unwrap_or_default(),
        other => other.to_string(),
    }
}
