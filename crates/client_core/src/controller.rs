//! Fetch / filter / paginate / mutate cycle for a single list page.
//!
//! The controller owns one authoritative snapshot per list. Every derived view
//! (search, filter, sort, page) is recomputed from that snapshot, and every
//! successful mutation replaces it through a full re-fetch.

use std::sync::Arc;

use serde_json::Value;
use shared::domain::{Book, BookDraft, BookId, Library};
use tracing::{debug, info};

use crate::{
    api::CatalogApi,
    error::ClientError,
    listing::{self, PageWindow, Resource, SortCriterion},
    view::{ErrorBanner, ErrorContext, FetchTrigger, ViewState},
};

pub const DEFAULT_PAGE_SIZE: usize = 12;

pub type BookListController = ListViewController<Book>;
pub type LibraryListController = ListViewController<Library>;

pub struct ListViewController<R: Resource> {
    api: Arc<CatalogApi>,
    snapshot: Vec<R>,
    visible: Vec<R>,
    query: String,
    sort: Option<SortCriterion>,
    retain: Option<fn(&R) -> bool>,
    page_size: usize,
    page: usize,
    loaded: bool,
    state: ViewState,
}

impl<R: Resource> ListViewController<R> {
    pub fn new(api: Arc<CatalogApi>) -> Self {
        Self::with_page_size(api, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(api: Arc<CatalogApi>, page_size: usize) -> Self {
        Self {
            api,
            snapshot: Vec::new(),
            visible: Vec::new(),
            query: String::new(),
            sort: None,
            retain: None,
            page_size: page_size.max(1),
            page: 1,
            loaded: false,
            state: ViewState::Idle,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn snapshot(&self) -> &[R] {
        &self.snapshot
    }

    /// Filtered and sorted view over the snapshot, before pagination.
    pub fn visible(&self) -> &[R] {
        &self.visible
    }

    pub fn sort_criterion(&self) -> Option<SortCriterion> {
        self.sort
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        listing::page_count(self.visible.len(), self.page_size)
    }

    pub fn page_window(&self) -> Option<PageWindow> {
        PageWindow::new(self.visible.len(), self.page_size, self.page)
    }

    pub async fn load(&mut self) -> Result<(), ClientError> {
        self.refresh(FetchTrigger::Mount).await
    }

    /// Re-fetches the collection. The snapshot is only replaced on success.
    pub async fn refresh(&mut self, trigger: FetchTrigger) -> Result<(), ClientError> {
        self.state = ViewState::Loading;
        debug!(path = R::COLLECTION_PATH, ?trigger, "list fetch started");

        match self.api.fetch_collection::<R>(R::COLLECTION_PATH).await {
            Ok(records) => {
                info!(
                    path = R::COLLECTION_PATH,
                    ?trigger,
                    records = records.len(),
                    "list fetched"
                );
                self.snapshot = records;
                self.loaded = true;
                if trigger == FetchTrigger::Mount {
                    self.page = 1;
                }
                self.recompute();
                self.page = listing::clamp_page(self.page, self.total_pages());
                self.state = ViewState::Ready;
                Ok(())
            }
            Err(err) => {
                let err = err.into_fetch_failure(R::COLLECTION_PATH);
                self.state = ViewState::Errored(ErrorBanner::from_error(ErrorContext::Load, &err));
                Err(err)
            }
        }
    }

    /// Recomputes the view from the full snapshot and returns to the first page.
    pub fn search(&mut self, query: &str) -> &[R] {
        self.query = query.trim().to_string();
        self.page = 1;
        self.recompute();
        &self.visible
    }

    /// Orders the current view. The snapshot keeps server order.
    pub fn sort(&mut self, criterion: SortCriterion) -> &[R] {
        self.sort = Some(criterion);
        listing::sort(&mut self.visible, criterion);
        &self.visible
    }

    /// Clamps `page` into the valid range and returns its records.
    pub fn page(&mut self, page: usize) -> &[R] {
        self.page = listing::clamp_page(page, self.total_pages());
        self.current_records()
    }

    pub fn current_records(&self) -> &[R] {
        listing::paginate(&self.visible, self.page_size, self.page)
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.state, ViewState::Errored(_)) {
            self.state = if self.loaded {
                ViewState::Ready
            } else {
                ViewState::Idle
            };
        }
    }

    fn recompute(&mut self) {
        let mut visible = listing::search(&self.snapshot, &self.query);
        if let Some(retain) = self.retain {
            visible.retain(|record| retain(record));
        }
        if let Some(criterion) = self.sort {
            listing::sort(&mut visible, criterion);
        }
        self.visible = visible;
    }

    /// Replaces whatever the last fetch left behind with an error banner.
    pub(crate) fn show_error(&mut self, context: ErrorContext, err: &ClientError) {
        self.state = ViewState::Errored(ErrorBanner::from_error(context, err));
    }

    fn settle<T>(
        &mut self,
        context: ErrorContext,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        result.map_err(|err| {
            self.show_error(context, &err);
            err
        })
    }
}

impl ListViewController<Library> {
    pub fn only_with_books(&mut self, enabled: bool) -> &[Library] {
        self.retain = enabled.then_some(listing::has_books as fn(&Library) -> bool);
        self.page = 1;
        self.recompute();
        &self.visible
    }
}

pub(crate) fn validate_draft(draft: &BookDraft) -> Result<(), ClientError> {
    draft
        .validate()
        .map_err(|field| ClientError::Validation(format!("{field} is required")))
}

impl ListViewController<Book> {
    /// Validates and posts a new book without reloading the list.
    pub async fn submit(&mut self, draft: &BookDraft) -> Result<Value, ClientError> {
        let result = match validate_draft(draft) {
            Ok(()) => self.api.create_book(draft).await,
            Err(err) => Err(err),
        };
        let created = self.settle(ErrorContext::Create, result)?;
        info!(name = %draft.name, "book created");
        Ok(created)
    }

    pub async fn create(&mut self, draft: &BookDraft) -> Result<(), ClientError> {
        self.submit(draft).await?;
        self.refresh(FetchTrigger::PostMutation).await
    }

    pub async fn update(&mut self, id: BookId, draft: &BookDraft) -> Result<(), ClientError> {
        let result = match validate_draft(draft) {
            Ok(()) => self.api.update_book(id, draft).await,
            Err(err) => Err(err),
        };
        self.settle(ErrorContext::Update, result)?;
        info!(%id, "book updated");
        self.refresh(FetchTrigger::PostMutation).await
    }

    pub async fn delete(&mut self, id: BookId) -> Result<(), ClientError> {
        let result = self.api.delete_book(id).await;
        self.settle(ErrorContext::Delete, result)?;
        info!(%id, "book deleted");
        self.refresh(FetchTrigger::PostMutation).await
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
