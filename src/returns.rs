//! Stateful views over the returns endpoints.
//!
//! These hold the data a dashboard page shows: the current filters, the
//! loaded page of returns and its loading/error state.  Every change goes
//! back to the backend; nothing is updated optimistically.

use log::{debug, info};
use serde_json::Value;

use crate::api::{ApiError, ReturnsClient, Transport};
use crate::model::{
    NewReturn, Pagination, Recommendation, ReturnFilters, ReturnId, ReturnRecord, ReturnStatus,
    ReturnsPage,
};
use crate::resource::Resource;

/// Construction options of a [`ReturnsList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListOptions {
    /// Load the first page as soon as the list is created.
    pub auto_load: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self { auto_load: true }
    }
}

/// Filtered, paginated list of returns.
pub struct ReturnsList<'c, T> {
    client: &'c ReturnsClient<T>,
    filters: ReturnFilters,
    filters_key: String,
    resource: Resource<ReturnsPage>,
}

impl<'c, T: Transport> ReturnsList<'c, T> {
    pub fn new(client: &'c ReturnsClient<T>, filters: ReturnFilters, options: ListOptions) -> Self {
        let mut list = Self {
            client,
            filters_key: filters_key(&filters),
            filters,
            resource: Resource::new(),
        };
        if options.auto_load {
            list.reload();
        }
        list
    }

    /// Current filters.
    pub fn filters(&self) -> &ReturnFilters {
        &self.filters
    }

    /// Replaces the filters, reloading only when their content changed.
    ///
    /// Returns whether a reload happened.
    pub fn set_filters(&mut self, filters: ReturnFilters) -> bool {
        let key = filters_key(&filters);
        if key == self.filters_key {
            debug!("Filters unchanged, skipping reload");
            return false;
        }
        self.filters = filters;
        self.filters_key = key;
        self.reload();
        true
    }

    /// Loads the page described by the current filters.
    pub fn reload(&mut self) -> bool {
        let filters = self.filters.clone();
        self.fetch(&filters)
    }

    /// Loads with `overrides` laid over the current filters, without storing them.
    pub fn reload_with(&mut self, overrides: &ReturnFilters) -> bool {
        let filters = self.filters.merged(overrides);
        self.fetch(&filters)
    }

    /// Moves to the 1-indexed `page`.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        let filters = self.filters.for_page(page);
        self.set_filters(filters)
    }

    /// Filters by free text, starting again from the first page.
    pub fn search(&mut self, text: &str) -> bool {
        let mut filters = self.filters.clone();
        filters.search = Some(text.to_owned()).filter(|text| !text.is_empty());
        filters.offset = Some(0);
        self.set_filters(filters)
    }

    /// Filters by status, or clears the filter with `None`, starting again from the first page.
    pub fn filter_status(&mut self, status: Option<ReturnStatus>) -> bool {
        let mut filters = self.filters.clone();
        filters.status = status;
        filters.offset = Some(0);
        self.set_filters(filters)
    }

    /// Moves return `id` to `status` and reloads the list on success.
    ///
    /// On failure the error is kept in [`error`](Self::error) and `false` is returned.
    pub fn update_status(
        &mut self,
        id: &ReturnId,
        status: ReturnStatus,
        notes: Option<&str>,
    ) -> bool {
        match self.client.update_return_status(id, status, notes) {
            Ok(_) => {
                info!("Return {id} moved to {status}");
                self.reload();
                true
            }
            Err(err) => {
                self.resource.fail(err.to_string());
                false
            }
        }
    }

    /// Records of the last loaded page.
    pub fn returns(&self) -> &[ReturnRecord] {
        self.resource
            .latest()
            .map_or(&[][..], |page| page.data.as_slice())
    }

    /// Pagination of the last loaded page.
    pub fn pagination(&self) -> Pagination {
        let empty = ReturnsPage::default();
        let page = self.resource.latest().unwrap_or(&empty);
        Pagination {
            total: page.total,
            page: page.page,
            total_pages: page.total_pages,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.resource.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.resource.error()
    }

    /// Totals computed from the loaded page.
    pub fn insights(&self) -> PageInsights {
        PageInsights::from_records(self.returns())
    }

    /// Underlying resource, for subscribing to state changes.
    pub fn resource_mut(&mut self) -> &mut Resource<ReturnsPage> {
        &mut self.resource
    }

    fn fetch(&mut self, filters: &ReturnFilters) -> bool {
        let client = self.client;
        self.resource.load_with(|| client.get_returns(filters))
    }
}

fn filters_key(filters: &ReturnFilters) -> String {
    serde_json::to_string(filters).unwrap_or_default()
}

/// Summary of the records on the current page.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PageInsights {
    pub total_value: f64,
    pub pending_count: usize,
}

impl PageInsights {
    pub fn from_records(records: &[ReturnRecord]) -> Self {
        records.iter().fold(Self::default(), |mut insights, record| {
            insights.total_value += record.total_value;
            if record.status == ReturnStatus::Pending {
                insights.pending_count += 1;
            }
            insights
        })
    }
}

/// AI recommendations, held in memory only.
pub struct RecommendationsFeed<'c, T> {
    client: &'c ReturnsClient<T>,
    resource: Resource<Vec<Recommendation>>,
}

impl<'c, T: Transport> RecommendationsFeed<'c, T> {
    /// Creates an empty feed. Nothing is fetched until [`fetch`](Self::fetch).
    pub fn new(client: &'c ReturnsClient<T>) -> Self {
        Self {
            client,
            resource: Resource::new(),
        }
    }

    /// Fetches recommendations from the backend, optionally forcing regeneration.
    pub fn fetch(&mut self, force_refresh: bool) -> bool {
        let client = self.client;
        self.resource
            .load_with(|| client.get_recommendations(force_refresh))
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        self.resource.latest().map_or(&[][..], Vec::as_slice)
    }

    pub fn is_loading(&self) -> bool {
        self.resource.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.resource.error()
    }

    pub fn resource_mut(&mut self) -> &mut Resource<Vec<Recommendation>> {
        &mut self.resource
    }
}

/// Creates returns, keeping the state of the last attempt.
pub struct ReturnCreator<'c, T> {
    client: &'c ReturnsClient<T>,
    loading: bool,
    error: Option<String>,
}

impl<'c, T: Transport> ReturnCreator<'c, T> {
    pub fn new(client: &'c ReturnsClient<T>) -> Self {
        Self {
            client,
            loading: false,
            error: None,
        }
    }

    /// Submits `new_return`. The error is both stored and returned.
    pub fn create(&mut self, new_return: &NewReturn) -> Result<Value, ApiError> {
        self.loading = true;
        self.error = None;
        let result = self.client.create_return(new_return);
        self.loading = false;

        if let Err(err) = &result {
            self.error = Some(err.to_string());
        }
        result
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, status: ReturnStatus, total_value: f64) -> ReturnRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "return_number": format!("RET-{id}"),
            "status": status.as_str(),
            "total_value": total_value,
        }))
        .unwrap()
    }

    #[test]
    fn insights_sum_the_page() {
        let records = [
            record(1, ReturnStatus::Pending, 10.5),
            record(2, ReturnStatus::Approved, 4.5),
            record(3, ReturnStatus::Pending, 0.0),
        ];
        let insights = PageInsights::from_records(&records);
        assert_eq!(insights.total_value, 15.0);
        assert_eq!(insights.pending_count, 2);
    }

    #[test]
    fn insights_of_empty_page_are_zero() {
        assert_eq!(PageInsights::from_records(&[]), PageInsights::default());
    }

    #[test]
    fn equal_filters_have_equal_keys() {
        let a = ReturnFilters::paged(10, 0).with_status(ReturnStatus::Pending);
        let b = ReturnFilters::paged(10, 0).with_status(ReturnStatus::Pending);
        assert_eq!(filters_key(&a), filters_key(&b));
        assert_ne!(filters_key(&a), filters_key(&ReturnFilters::paged(10, 10)));
    }
}
