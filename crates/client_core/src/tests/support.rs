//! In-process catalog API used by the HTTP-facing tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{Book, BookId, Library, LibraryId};
use tokio::net::TcpListener;

use crate::{
    api::CatalogApi,
    session::{MemorySessionStore, Session},
};

pub(crate) const VALID_TOKEN: &str = "valid-token";
pub(crate) const LIBRARY_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub(crate) struct MockState {
    pub books: Vec<Book>,
    pub libraries: Vec<Library>,
    /// Library id -> books held by that library.
    pub holdings: HashMap<i64, Vec<Book>>,
    pub envelope: bool,
    pub next_id: i64,
    pub requests: Vec<Recorded>,
    /// (method, path) -> canned status and body.
    pub forced: HashMap<(String, String), (u16, Value)>,
    /// Book names whose create is rejected with a 400.
    pub rejected_names: Vec<String>,
}

#[derive(Clone, Default)]
pub(crate) struct MockCatalog {
    pub state: Arc<Mutex<MockState>>,
}

pub(crate) fn book(id: i64, name: &str, author: &str) -> Book {
    Book {
        id: BookId(id),
        name: name.to_string(),
        author: author.to_string(),
        publisher: None,
        quantity_in_library: None,
    }
}

pub(crate) fn library(id: i64, name: &str, address: Option<&str>, total_books: u64) -> Library {
    Library {
        id: LibraryId(id),
        name: name.to_string(),
        address: address.map(str::to_string),
        total_books,
        is_active: true,
        phone: None,
        email: None,
        image: None,
    }
}

impl MockCatalog {
    pub fn with_books(books: Vec<Book>) -> Self {
        let mock = Self::default();
        {
            let mut state = mock.state.lock().expect("mock state");
            state.next_id = books.iter().map(|b| b.id.0).max().unwrap_or(0) + 1;
            state.books = books;
        }
        mock
    }

    pub fn with_libraries(libraries: Vec<Library>) -> Self {
        let mock = Self::default();
        mock.state.lock().expect("mock state").libraries = libraries;
        mock
    }

    pub fn force(&self, method: &str, path: &str, status: u16, body: Value) {
        self.state
            .lock()
            .expect("mock state")
            .forced
            .insert((method.to_string(), path.to_string()), (status, body));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().expect("mock state").requests.clone()
    }

    pub fn requests_matching(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub async fn spawn(self) -> String {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new()
            .route("/api/v1/books/books/", get(list_books).post(create_book))
            .route("/api/v1/books/add-books/", post(create_book))
            .route(
                "/api/v1/books/book/:id/",
                get(get_book).put(update_book).delete(delete_book),
            )
            .route("/api/v1/libraries/libraries/", get(list_libraries))
            .route("/api/v1/libraries/library/:id/", get(library_detail))
            .route("/api/v1/auth/login/", post(login))
            .route("/api/v1/auth/register-library/", post(register_library))
            .with_state(self);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/api/v1")
    }

    /// Records the request and returns a canned response when one is registered.
    fn intake(
        &self,
        method: Method,
        path: String,
        headers: &HeaderMap,
        body: Value,
    ) -> Result<Option<String>, Response> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        let mut state = self.state.lock().expect("mock state");
        state.requests.push(Recorded {
            method: method.to_string(),
            path: path.clone(),
            bearer: bearer.clone(),
            body,
        });
        if let Some((status, body)) = state.forced.get(&(method.to_string(), path)).cloned() {
            return Err(respond(status, body));
        }
        Ok(bearer)
    }
}

fn respond(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if body.is_null() {
        status.into_response()
    } else {
        (status, Json(body)).into_response()
    }
}

fn unauthorized() -> Response {
    respond(401, json!({ "detail": "Given token not valid for any token type" }))
}

/// Public reads accept no token or the valid one; a stale token is rejected.
fn public_read_allowed(bearer: &Option<String>) -> bool {
    bearer.as_deref().map_or(true, |token| token == VALID_TOKEN)
}

fn write_allowed(bearer: &Option<String>) -> bool {
    bearer.as_deref() == Some(VALID_TOKEN)
}

async fn list_books(State(mock): State<MockCatalog>, headers: HeaderMap) -> Response {
    let bearer = match mock.intake(Method::GET, "/books/books/".into(), &headers, Value::Null) {
        Ok(bearer) => bearer,
        Err(response) => return response,
    };
    if !public_read_allowed(&bearer) {
        return unauthorized();
    }
    let state = mock.state.lock().expect("mock state");
    let books = serde_json::to_value(&state.books).expect("books json");
    if state.envelope {
        respond(200, json!({ "results": books, "count": state.books.len() }))
    } else {
        respond(200, books)
    }
}

async fn create_book(
    State(mock): State<MockCatalog>,
    method: Method,
    uri: axum::http::Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = uri.path().trim_start_matches("/api/v1").to_string();
    let bearer = match mock.intake(method, path, &headers, body.clone()) {
        Ok(bearer) => bearer,
        Err(response) => return response,
    };
    if !write_allowed(&bearer) {
        return unauthorized();
    }
    let mut state = mock.state.lock().expect("mock state");
    let name = body["name"].as_str().unwrap_or_default().to_string();
    if state.rejected_names.contains(&name) {
        return respond(400, json!({ "name": ["book with this name already exists."] }));
    }
    let id = state.next_id;
    state.next_id += 1;
    let created = Book {
        id: BookId(id),
        name,
        author: body["author"].as_str().unwrap_or_default().to_string(),
        publisher: body["publisher"].as_str().map(str::to_string),
        quantity_in_library: body["quantity_in_library"].as_u64().map(|q| q as u32),
    };
    state.books.push(created.clone());
    respond(201, serde_json::to_value(created).expect("book json"))
}

async fn get_book(
    State(mock): State<MockCatalog>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/books/book/{id}/");
    let bearer = match mock.intake(Method::GET, path, &headers, Value::Null) {
        Ok(bearer) => bearer,
        Err(response) => return response,
    };
    if !public_read_allowed(&bearer) {
        return unauthorized();
    }
    let state = mock.state.lock().expect("mock state");
    match state.books.iter().find(|b| b.id.0 == id) {
        Some(book) => respond(200, serde_json::to_value(book).expect("book json")),
        None => respond(404, json!({ "detail": "Not found." })),
    }
}

async fn update_book(
    State(mock): State<MockCatalog>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = format!("/books/book/{id}/");
    let bearer = match mock.intake(Method::PUT, path, &headers, body.clone()) {
        Ok(bearer) => bearer,
        Err(response) => return response,
    };
    if !write_allowed(&bearer) {
        return unauthorized();
    }
    let mut state = mock.state.lock().expect("mock state");
    let Some(book) = state.books.iter_mut().find(|b| b.id.0 == id) else {
        return respond(404, json!({ "detail": "Not found." }));
    };
    book.name = body["name"].as_str().unwrap_or_default().to_string();
    book.author = body["author"].as_str().unwrap_or_default().to_string();
    book.publisher = body["publisher"].as_str().map(str::to_string);
    book.quantity_in_library = body["quantity_in_library"].as_u64().map(|q| q as u32);
    respond(200, serde_json::to_value(book.clone()).expect("book json"))
}

async fn delete_book(
    State(mock): State<MockCatalog>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/books/book/{id}/");
    let bearer = match mock.intake(Method::DELETE, path, &headers, Value::Null) {
        Ok(bearer) => bearer,
        Err(response) => return response,
    };
    if !write_allowed(&bearer) {
        return unauthorized();
    }
    let mut state = mock.state.lock().expect("mock state");
    let before = state.books.len();
    state.books.retain(|b| b.id.0 != id);
    if state.books.len() == before {
        respond(404, json!({ "detail": "Not found." }))
    } else {
        respond(204, Value::Null)
    }
}

async fn list_libraries(State(mock): State<MockCatalog>, headers: HeaderMap) -> Response {
    let bearer = match mock.intake(
        Method::GET,
        "/libraries/libraries/".into(),
        &headers,
        Value::Null,
    ) {
        Ok(bearer) => bearer,
        Err(response) => return response,
    };
    if !public_read_allowed(&bearer) {
        return unauthorized();
    }
    let state = mock.state.lock().expect("mock state");
    let libraries = serde_json::to_value(&state.libraries).expect("libraries json");
    if state.envelope {
        respond(200, json!({ "results": libraries, "count": state.libraries.len() }))
    } else {
        respond(200, libraries)
    }
}

async fn library_detail(
    State(mock): State<MockCatalog>,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/libraries/library/{id}/");
    let body = json!({ "page": query.get("page") });
    let bearer = match mock.intake(Method::GET, path, &headers, body) {
        Ok(bearer) => bearer,
        Err(response) => return response,
    };
    if !public_read_allowed(&bearer) {
        return unauthorized();
    }
    let page = query
        .get("page")
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(1);
    let state = mock.state.lock().expect("mock state");
    let Some(library) = state.libraries.iter().find(|l| l.id.0 == id) else {
        return respond(404, json!({ "detail": "Not found." }));
    };
    let holdings = state.holdings.get(&id).cloned().unwrap_or_default();
    let page_books: Vec<Book> = holdings
        .iter()
        .skip((page - 1) * LIBRARY_PAGE_SIZE)
        .take(LIBRARY_PAGE_SIZE)
        .cloned()
        .collect();
    respond(
        200,
        json!({
            "results": {
                "library": {
                    "id": library.id,
                    "name": library.name,
                    "address": library.address,
                },
                "phone": library.phone,
                "is_active": library.is_active,
                "total_books": library.total_books,
                "books": page_books,
            },
            "count": holdings.len(),
        }),
    )
}

async fn login(
    State(mock): State<MockCatalog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = mock.intake(Method::POST, "/auth/login/".into(), &headers, body.clone())
    {
        return response;
    }
    if body["password"] == "secret" {
        respond(
            200,
            json!({
                "access": VALID_TOKEN,
                "refresh": "refresh-token",
                "user": { "phone": body["phone"], "name": "Kutubxonachi" },
            }),
        )
    } else {
        respond(
            401,
            json!({ "detail": "No active account found with the given credentials" }),
        )
    }
}

async fn register_library(
    State(mock): State<MockCatalog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = mock.intake(
        Method::POST,
        "/auth/register-library/".into(),
        &headers,
        body.clone(),
    ) {
        return response;
    }
    if body["user"]["phone"] == "+998900000000" {
        return respond(
            400,
            json!({ "user": { "phone": ["user with this phone already exists."] } }),
        );
    }
    respond(
        201,
        json!({ "id": 77, "name": body["user"]["name"], "phone": body["user"]["phone"] }),
    )
}

pub(crate) fn signed_in_store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::with_session(Session {
        access_token: VALID_TOKEN.to_string(),
        refresh_token: Some("refresh-token".to_string()),
        user: json!({ "phone": "+998901234567" }),
    }))
}

pub(crate) fn api_for(base_url: &str, store: Arc<MemorySessionStore>) -> Arc<CatalogApi> {
    Arc::new(CatalogApi::new(base_url, store))
}
