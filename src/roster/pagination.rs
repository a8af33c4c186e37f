//! Pagination accumulator for the visible roster.

use std::collections::HashSet;

use crate::models::CrewRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Empty,
    LoadingFirstPage,
    HasData,
    LoadingMore,
    Exhausted,
}

/// Accumulates successive pages into the visible roster.
#[derive(Debug, Clone)]
pub struct Pagination {
    page_size: usize,
    pages_loaded: usize,
    state: PageState,
    rows: Vec<CrewRecord>,
    total_hint: Option<u64>,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            pages_loaded: 0,
            state: PageState::Empty,
            rows: Vec::new(),
            total_hint: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn rows(&self) -> &[CrewRecord] {
        &self.rows
    }

    /// Index of the last page loaded, if any.
    pub fn current_page(&self) -> Option<usize> {
        self.pages_loaded.checked_sub(1)
    }

    pub fn has_more(&self) -> bool {
        self.state == PageState::HasData
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            PageState::LoadingFirstPage | PageState::LoadingMore
        )
    }

    /// Backend-reported total; advisory only.
    pub fn total_hint(&self) -> Option<u64> {
        self.total_hint
    }

    /// Drop all rows and return to page 0.
    pub fn reset(&mut self) {
        self.pages_loaded = 0;
        self.state = PageState::Empty;
        self.rows.clear();
        self.total_hint = None;
    }

    /// Reset and mark the first page as in flight.
    pub fn begin_first_page(&mut self) {
        self.reset();
        self.state = PageState::LoadingFirstPage;
    }

    /// Mark the next page as in flight, returning its row offset.
    ///
    /// `None` when nothing more can be loaded right now.
    pub fn begin_load_more(&mut self) -> Option<usize> {
        if self.state != PageState::HasData {
            return None;
        }
        self.state = PageState::LoadingMore;
        Some(self.next_offset())
    }

    pub fn next_offset(&self) -> usize {
        self.pages_loaded * self.page_size
    }

    pub fn first_page_loaded(&mut self, rows: Vec<CrewRecord>, total_hint: Option<u64>) {
        let short = rows.len() < self.page_size;
        self.rows = rows;
        self.pages_loaded = 1;
        self.total_hint = total_hint;
        self.state = if short {
            PageState::Exhausted
        } else {
            PageState::HasData
        };
    }

    /// Append a later page, skipping rows already on screen.
    pub fn page_appended(&mut self, rows: Vec<CrewRecord>, total_hint: Option<u64>) {
        let short = rows.len() < self.page_size;
        let mut seen: HashSet<String> = self.rows.iter().map(|r| r.id.clone()).collect();
        for row in rows {
            if seen.insert(row.id.clone()) {
                self.rows.push(row);
            }
        }
        self.pages_loaded += 1;
        if total_hint.is_some() {
            self.total_hint = total_hint;
        }
        self.state = if short {
            PageState::Exhausted
        } else {
            PageState::HasData
        };
    }

    /// Return to the last stable state after a failed load.
    pub fn load_failed(&mut self) {
        self.state = match self.state {
            PageState::LoadingFirstPage => PageState::Empty,
            PageState::LoadingMore => PageState::HasData,
            other => other,
        };
    }

    /// Show a complete dataset with paging disabled.
    pub fn show_all(&mut self, rows: Vec<CrewRecord>) {
        self.total_hint = Some(rows.len() as u64);
        self.rows = rows;
        self.pages_loaded = 1;
        self.state = PageState::Exhausted;
    }
}
