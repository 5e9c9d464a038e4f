//! Client core for the kutubxona library catalog: HTTP boundary, session
//! persistence, list/detail controllers, account flows, bulk import and the map.

pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod detail;
pub mod error;
pub mod geocode;
pub mod import;
pub mod listing;
pub mod session;
pub mod view;

pub use api::{Access, CatalogApi};
pub use auth::{AuthService, SignupForm};
pub use config::{load_settings, ClientSettings};
pub use controller::{BookListController, LibraryListController, ListViewController};
pub use detail::{Availability, BookDetailController, LibraryDetailController};
pub use error::ClientError;
pub use geocode::{Geocoder, MapLabel, MapView, YandexGeocoder};
pub use import::{import_books, ImportError, ImportReport};
pub use listing::{Resource, SortCriterion};
pub use session::{DurableSessionStore, MemorySessionStore, Session, SessionStore};
pub use view::{ErrorBanner, FetchTrigger, ViewState};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
