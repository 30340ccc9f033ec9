//! Data structures shared by the report renderer and the returns client.
//!
//! Report inputs are deliberately loose: every field has a default so that a
//! partially populated JSON document still renders.  The returns types mirror
//! the payloads of the `/api/v1/returns` endpoints.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Name of the general statistics section.
pub const SECTION_SUMMARY: &str = "summary";
/// Name of the returns table section.
pub const SECTION_RETURNS: &str = "returns";
/// Name of the AI recommendations section.
pub const SECTION_RECOMMENDATIONS: &str = "recommendations";

/// Caller supplied description of the reporting period and its statistics.
///
/// Unknown top-level fields are preserved in [`ReportData::extra`] so that
/// callers can round-trip richer payloads without the renderer caring about
/// them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportData {
    /// Period identifier such as `week`, `month`, `quarter` or `year`.
    pub selected_period: String,
    /// Headline statistics shown in the summary section.
    pub general_stats: GeneralStats,
    /// Return records listed in the returns section.
    pub returns: Vec<ReturnRecord>,
    /// Recommendations listed in the recommendations section.
    pub recommendations: Vec<Recommendation>,
    /// Remaining fields of the payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReportData {
    /// Creates report data for the given period with empty statistics.
    pub fn new(selected_period: impl Into<String>) -> Self {
        Self {
            selected_period: selected_period.into(),
            ..Self::default()
        }
    }

    /// Sets the general statistics and returns the updated data.
    pub fn with_general_stats(mut self, general_stats: GeneralStats) -> Self {
        self.general_stats = general_stats;
        self
    }

    /// Sets the returns listed in the report and returns the updated data.
    pub fn with_returns(mut self, returns: impl Into<Vec<ReturnRecord>>) -> Self {
        self.returns = returns.into();
        self
    }

    /// Sets the recommendations listed in the report and returns the updated data.
    pub fn with_recommendations(mut self, recommendations: impl Into<Vec<Recommendation>>) -> Self {
        self.recommendations = recommendations.into();
        self
    }
}

/// Headline numbers of the summary section. Missing values render as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralStats {
    /// Total waste in kilograms.
    pub total_waste: Option<f64>,
    /// Number of expected returns.
    pub total_returns: Option<f64>,
}

/// Section inclusion flags keyed by section name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedSections(BTreeMap<String, bool>);

impl SelectedSections {
    /// Creates an empty selection where every section is excluded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag for `section` and returns the updated selection.
    pub fn with(mut self, section: impl Into<String>, included: bool) -> Self {
        self.set(section, included);
        self
    }

    /// Sets the flag for `section`.
    pub fn set(&mut self, section: impl Into<String>, included: bool) {
        self.0.insert(section.into(), included);
    }

    /// Returns whether `section` is flagged for inclusion.
    pub fn includes(&self, section: &str) -> bool {
        self.0.get(section).copied().unwrap_or(false)
    }

    /// Parses a comma separated list such as `summary,returns` into a selection.
    pub fn from_list(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .fold(Self::new(), |selection, name| selection.with(name, true))
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for SelectedSections {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, flag)| (name.into(), flag)).collect())
    }
}

/// Lifecycle status of a return.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnStatus {
    /// Logged and awaiting a decision.
    Pending,
    /// Accepted by a reviewer.
    Approved,
    /// Declined by a reviewer.
    Rejected,
    /// Fully processed.
    Completed,
    /// Any status value the client does not know about.
    #[default]
    #[serde(other)]
    Other,
}

impl ReturnStatus {
    /// Returns the wire representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Other => "other",
        }
    }

    /// Status transitions offered for a record in this status.
    pub fn available_actions(self) -> &'static [ReturnStatus] {
        match self {
            Self::Pending => &[Self::Approved, Self::Rejected],
            _ => &[],
        }
    }
}

impl std::str::FromStr for ReturnStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown return status '{other}'")),
        }
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a return. The backend serves numeric ids, some deployments use strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReturnId {
    Number(i64),
    Text(String),
}

impl Default for ReturnId {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl fmt::Display for ReturnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => fmt::Display::fmt(id, f),
            Self::Text(id) => f.pad(id),
        }
    }
}

impl From<i64> for ReturnId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<String> for ReturnId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

impl From<&str> for ReturnId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

impl std::str::FromStr for ReturnId {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Ok(value
            .parse()
            .map_or_else(|_| Self::from(value), Self::Number))
    }
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A logged product return as served by the backend.
///
/// Missing or `null` fields fall back to defaults so a single sparse record
/// does not fail the whole page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: ReturnId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub return_number: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub items_summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ReturnStatus,
    #[serde(default)]
    pub status_label: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_value: f64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ReturnRecord {
    /// Label shown for the status, preferring the backend supplied label.
    pub fn display_status(&self) -> &str {
        self.status_label
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or(self.status.as_str())
    }
}

/// One page of the returns listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnsPage {
    pub data: Vec<ReturnRecord>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub page: u64,
    #[serde(default = "first_page")]
    pub total_pages: u64,
}

fn first_page() -> u64 {
    1
}

impl Default for ReturnsPage {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page: 1,
            total_pages: 1,
        }
    }
}

impl ReturnsPage {
    /// Wraps a bare list of records as a single page.
    pub fn single(records: Vec<ReturnRecord>) -> Self {
        Self {
            total: records.len() as u64,
            data: records,
            page: 1,
            total_pages: 1,
        }
    }
}

/// Pagination fields of a [`ReturnsPage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
}

/// AI generated suggestion derived from return patterns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendation {
    pub title: String,
    pub title_en: Option<String>,
    pub description: String,
    pub description_en: Option<String>,
    pub priority: String,
    pub savings: Option<f64>,
}

impl Recommendation {
    /// Title in the requested language, falling back to the base title.
    pub fn localized_title(&self, arabic: bool) -> &str {
        localized(&self.title, self.title_en.as_deref(), arabic)
    }

    /// Description in the requested language, falling back to the base description.
    pub fn localized_description(&self, arabic: bool) -> &str {
        localized(&self.description, self.description_en.as_deref(), arabic)
    }

    /// Expected savings when the backend reports a positive amount.
    pub fn positive_savings(&self) -> Option<f64> {
        self.savings.filter(|amount| *amount > 0.0)
    }
}

fn localized<'a>(base: &'a str, english: Option<&'a str>, arabic: bool) -> &'a str {
    if arabic {
        return base;
    }
    english.filter(|text| !text.is_empty()).unwrap_or(base)
}

/// Filters accepted by the returns listing endpoint.
///
/// Field order matches the query string order sent to the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReturnStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ReturnFilters {
    /// Creates filters with only pagination fields set.
    pub fn paged(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
            ..Self::default()
        }
    }

    /// Sets the status filter and returns the updated filters.
    pub fn with_status(mut self, status: impl Into<Option<ReturnStatus>>) -> Self {
        self.status = status.into();
        self
    }

    /// Sets the search text and returns the updated filters.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Copy of the filters where blank strings are treated as absent.
    pub fn normalized(&self) -> Self {
        fn present(value: &Option<String>) -> Option<String> {
            value
                .as_ref()
                .map(|text| text.trim())
                .filter(|text| !text.is_empty())
                .map(str::to_owned)
        }

        Self {
            facility_id: present(&self.facility_id),
            start_date: present(&self.start_date),
            end_date: present(&self.end_date),
            status: self.status,
            search: present(&self.search),
            reason: present(&self.reason),
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// Overlays the fields set in `overrides` on top of these filters.
    pub fn merged(&self, overrides: &ReturnFilters) -> Self {
        Self {
            facility_id: overrides.facility_id.clone().or_else(|| self.facility_id.clone()),
            start_date: overrides.start_date.clone().or_else(|| self.start_date.clone()),
            end_date: overrides.end_date.clone().or_else(|| self.end_date.clone()),
            status: overrides.status.or(self.status),
            search: overrides.search.clone().or_else(|| self.search.clone()),
            reason: overrides.reason.clone().or_else(|| self.reason.clone()),
            limit: overrides.limit.or(self.limit),
            offset: overrides.offset.or(self.offset),
        }
    }

    /// Moves to the given 1-indexed page keeping the current page size.
    pub fn for_page(&self, page: u32) -> Self {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        Self {
            limit: Some(limit),
            offset: Some(page.saturating_sub(1).saturating_mul(limit)),
            ..self.clone()
        }
    }
}

/// Page size used when filters do not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Payload accepted by the return creation endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewReturn {
    pub return_number: Option<String>,
    pub date: Option<String>,
    pub customer: Option<String>,
    pub supplier: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub items: Vec<Value>,
    pub notes: Option<String>,
}
