//! HTTP boundary to the catalog REST API.
//!
//! Every response shape is normalized here: list endpoints may answer with a bare
//! array or a `{ results, count }` envelope, and non-2xx statuses are mapped onto
//! [`ClientError`] before anything reaches the controllers.

use std::sync::Arc;

use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{Book, BookDraft, BookId, LibraryDetail, LibraryId},
    protocol::{
        server_message, Collection, LibraryDetailEnvelope, LoginRequest, LoginResponse,
        RegisterLibraryRequest, RegisterLibraryResponse,
    },
};
use tracing::{debug, error, warn};

use crate::{error::ClientError, session::SessionStore};

pub const BOOKS_PATH: &str = "/books/books/";
pub const ADD_BOOKS_PATH: &str = "/books/add-books/";
pub const LIBRARIES_PATH: &str = "/libraries/libraries/";
pub const LOGIN_PATH: &str = "/auth/login/";
pub const REGISTER_LIBRARY_PATH: &str = "/auth/register-library/";

pub fn book_path(id: BookId) -> String {
    format!("/books/book/{id}/")
}

pub fn library_path(id: LibraryId) -> String {
    format!("/libraries/library/{id}/")
}

/// How a request relates to the stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Bearer attached when a token exists; a 401 clears the session.
    Public,
    /// A token must exist before the request is sent; a 401 clears the session.
    Required,
    /// Never carries a token; a 401 is an ordinary rejection (bad credentials).
    Anonymous,
}

pub struct CatalogApi {
    http: Client,
    base_url: String,
    create_book_path: String,
    session: Arc<dyn SessionStore>,
}

impl CatalogApi {
    pub fn new(base_url: impl Into<String>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            create_book_path: BOOKS_PATH.to_string(),
            session,
        }
    }

    pub fn with_create_path(mut self, path: impl Into<String>) -> Self {
        self.create_book_path = path.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn token(&self) -> Result<Option<String>, ClientError> {
        self.session.get().await.map_err(ClientError::Storage)
    }

    /// Returns the stored token or fails with `Unauthorized` without touching the network.
    pub async fn require_session(&self) -> Result<String, ClientError> {
        self.token().await?.ok_or(ClientError::Unauthorized)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        access: Access,
    ) -> Result<RequestBuilder, ClientError> {
        let token = match access {
            Access::Anonymous => None,
            Access::Public => self.token().await?,
            Access::Required => Some(self.require_session().await?),
        };

        let mut builder = self
            .http
            .request(method, self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        path: &str,
        access: Access,
    ) -> Result<Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(path, status = status.as_u16(), "catalog api response");
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        match (status, access) {
            (StatusCode::UNAUTHORIZED, Access::Public | Access::Required) => {
                warn!(path, "catalog api: unauthorized, clearing session");
                if let Err(err) = self.session.clear().await {
                    error!("catalog api: failed to clear session after 401: {err:#}");
                }
                Err(ClientError::Unauthorized)
            }
            (StatusCode::NOT_FOUND, Access::Public | Access::Required) => {
                Err(ClientError::NotFound {
                    path: path.to_string(),
                })
            }
            _ => Err(ClientError::ServerRejected {
                status: status.as_u16(),
                message,
            }),
        }
    }

    pub async fn fetch_collection<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, ClientError> {
        let builder = self.request(Method::GET, path, Access::Public).await?;
        let response = self.execute(builder, path, Access::Public).await?;
        let collection: Collection<T> = response.json().await?;
        Ok(collection.into_records())
    }

    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut builder = self.request(Method::GET, path, Access::Public).await?;
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let response = self.execute(builder, path, Access::Public).await?;
        Ok(response.json().await?)
    }

    /// Sends a JSON body; an empty success body comes back as `Value::Null`.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        access: Access,
    ) -> Result<Value, ClientError> {
        let builder = self.request(method, path, access).await?.json(body);
        let response = self.execute(builder, path, access).await?;
        read_json_or_null(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let builder = self.request(Method::DELETE, path, Access::Required).await?;
        self.execute(builder, path, Access::Required).await?;
        Ok(())
    }

    pub async fn fetch_book(&self, id: BookId) -> Result<Book, ClientError> {
        self.fetch_one(&book_path(id), &[]).await
    }

    /// `page` is 1-based; the query parameter is only sent past the first page.
    pub async fn fetch_library_detail(
        &self,
        id: LibraryId,
        page: usize,
    ) -> Result<LibraryDetail, ClientError> {
        let query = if page > 1 {
            vec![("page", page.to_string())]
        } else {
            Vec::new()
        };
        let envelope: LibraryDetailEnvelope = self.fetch_one(&library_path(id), &query).await?;
        Ok(envelope.into_detail(id))
    }

    pub async fn create_book(&self, draft: &BookDraft) -> Result<Value, ClientError> {
        self.send_json(Method::POST, &self.create_book_path, draft, Access::Required)
            .await
    }

    pub async fn update_book(&self, id: BookId, draft: &BookDraft) -> Result<Value, ClientError> {
        self.send_json(Method::PUT, &book_path(id), draft, Access::Required)
            .await
    }

    pub async fn delete_book(&self, id: BookId) -> Result<(), ClientError> {
        self.delete(&book_path(id)).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        let body = self
            .send_json(Method::POST, LOGIN_PATH, request, Access::Anonymous)
            .await?;
        serde_json::from_value(body)
            .map_err(|err| ClientError::Network(format!("malformed login response: {err}")))
    }

    pub async fn register_library(
        &self,
        request: &RegisterLibraryRequest,
    ) -> Result<RegisterLibraryResponse, ClientError> {
        let body = self
            .send_json(
                Method::POST,
                REGISTER_LIBRARY_PATH,
                request,
                Access::Anonymous,
            )
            .await?;
        serde_json::from_value(body)
            .map_err(|err| ClientError::Network(format!("malformed signup response: {err}")))
    }
}

async fn read_json_or_null(response: Response) -> Result<Value, ClientError> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| ClientError::Network(format!("malformed response body: {err}")))
}

async fn error_message(response: Response) -> Option<String> {
    let bytes = response.bytes().await.ok()?;
    let body: Value = serde_json::from_slice(&bytes).ok()?;
    server_message(&body)
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
