//! Single-record pages: a book and a library with its server-paginated holdings.

use std::sync::Arc;

use shared::domain::{Book, BookId, Library, LibraryDetail, LibraryId};
use tracing::{debug, info};

use crate::{
    api::{book_path, library_path, CatalogApi},
    error::ClientError,
    listing,
    view::{ErrorBanner, ErrorContext, FetchTrigger, ViewState},
};

pub const LIBRARY_BOOKS_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    InStock(u32),
    OutOfStock,
    Unknown,
}

impl Availability {
    pub fn of(book: &Book) -> Self {
        match book.quantity_in_library {
            Some(0) => Self::OutOfStock,
            Some(quantity) => Self::InStock(quantity),
            None => Self::Unknown,
        }
    }

    pub fn can_rent(self) -> bool {
        matches!(self, Self::InStock(_))
    }
}

pub struct BookDetailController {
    api: Arc<CatalogApi>,
    book: Option<Book>,
    state: ViewState,
}

impl BookDetailController {
    pub fn new(api: Arc<CatalogApi>) -> Self {
        Self {
            api,
            book: None,
            state: ViewState::Idle,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn availability(&self) -> Option<Availability> {
        self.book.as_ref().map(Availability::of)
    }

    pub async fn load(&mut self, id: BookId) -> Result<&Book, ClientError> {
        self.state = ViewState::Loading;
        if self.book.as_ref().is_some_and(|book| book.id != id) {
            self.book = None;
        }

        match self.api.fetch_book(id).await {
            Ok(book) => {
                info!(%id, "book detail fetched");
                self.state = ViewState::Ready;
                Ok(&*self.book.insert(book))
            }
            Err(err) => {
                let err = err.into_fetch_failure(&book_path(id));
                self.state = ViewState::Errored(ErrorBanner::from_error(ErrorContext::Load, &err));
                Err(err)
            }
        }
    }
}

pub struct LibraryDetailController {
    api: Arc<CatalogApi>,
    page_size: usize,
    id: Option<LibraryId>,
    page: usize,
    detail: Option<LibraryDetail>,
    state: ViewState,
}

impl LibraryDetailController {
    pub fn new(api: Arc<CatalogApi>) -> Self {
        Self::with_page_size(api, LIBRARY_BOOKS_PAGE_SIZE)
    }

    /// `page_size` must match the server's page size; it only drives the page count.
    pub fn with_page_size(api: Arc<CatalogApi>, page_size: usize) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
            id: None,
            page: 1,
            detail: None,
            state: ViewState::Idle,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn library(&self) -> Option<&Library> {
        self.detail.as_ref().map(|detail| &detail.library)
    }

    pub fn books(&self) -> &[Book] {
        self.detail
            .as_ref()
            .map(|detail| detail.books.as_slice())
            .unwrap_or_default()
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    /// Derived from the server-provided total, not from the books on this page.
    pub fn total_pages(&self) -> usize {
        let count = self.detail.as_ref().map_or(0, |detail| detail.count);
        listing::page_count(usize::try_from(count).unwrap_or(usize::MAX), self.page_size)
    }

    /// Opens a library at its first page.
    pub async fn load(&mut self, id: LibraryId) -> Result<(), ClientError> {
        let trigger = match self.id {
            None => FetchTrigger::Mount,
            Some(_) => FetchTrigger::IdChanged,
        };
        if self.id != Some(id) {
            self.detail = None;
        }
        self.id = Some(id);
        self.page = 1;
        self.fetch(id, trigger).await
    }

    pub async fn set_page(&mut self, page: usize) -> Result<(), ClientError> {
        let Some(id) = self.id else {
            return Err(ClientError::Validation("no library selected".to_string()));
        };
        self.page = listing::clamp_page(page, self.total_pages());
        self.fetch(id, FetchTrigger::PageChanged).await
    }

    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        match self.id {
            Some(id) => self.fetch(id, FetchTrigger::Manual).await,
            None => Ok(()),
        }
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.state, ViewState::Errored(_)) {
            self.state = if self.detail.is_some() {
                ViewState::Ready
            } else {
                ViewState::Idle
            };
        }
    }

    async fn fetch(&mut self, id: LibraryId, trigger: FetchTrigger) -> Result<(), ClientError> {
        self.state = ViewState::Loading;
        debug!(%id, page = self.page, ?trigger, "library detail fetch started");

        match self.api.fetch_library_detail(id, self.page).await {
            Ok(detail) => {
                info!(
                    %id,
                    page = self.page,
                    books = detail.books.len(),
                    count = detail.count,
                    "library detail fetched"
                );
                self.detail = Some(detail);
                self.state = ViewState::Ready;
                Ok(())
            }
            Err(err) => {
                let err = err.into_fetch_failure(&library_path(id));
                self.state = ViewState::Errored(ErrorBanner::from_error(ErrorContext::Load, &err));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/detail_tests.rs"]
mod tests;
