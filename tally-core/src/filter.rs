//! Dashboard filter state and the list-query parameters derived from it.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::expense::Category;
use crate::time::month_start;

/// The list endpoint's only supported ordering.
const SORT_DATE_DESC: &str = "date_desc";

/// Category selection. `All` is never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn category(&self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(c) => Some(*c),
        }
    }
}

impl From<Category> for CategoryFilter {
    fn from(c: Category) -> Self {
        CategoryFilter::Only(c)
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("All"),
            CategoryFilter::Only(c) => write!(f, "{c}"),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        Ok(CategoryFilter::Only(s.parse()?))
    }
}

/// Filter over the expense list.
///
/// Setters return `true` when the filter actually changed; callers use that to
/// decide whether a refetch is due. Changing the date range or the category
/// always moves back to page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    start_date: NaiveDate,
    end_date: NaiveDate,
    category: CategoryFilter,
    page: u32,
}

impl QueryFilter {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            category: CategoryFilter::All,
            page: 1,
        }
    }

    /// First of the month through `today`, all categories.
    pub fn month_to_date(today: NaiveDate) -> Self {
        Self::new(month_start(today), today)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn category(&self) -> CategoryFilter {
        self.category
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn set_category(&mut self, category: CategoryFilter) -> bool {
        if self.category == category {
            return false;
        }
        self.category = category;
        self.page = 1;
        true
    }

    pub fn set_start_date(&mut self, date: NaiveDate) -> bool {
        if self.start_date == date {
            return false;
        }
        self.start_date = date;
        self.page = 1;
        true
    }

    pub fn set_end_date(&mut self, date: NaiveDate) -> bool {
        if self.end_date == date {
            return false;
        }
        self.end_date = date;
        self.page = 1;
        true
    }

    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> bool {
        // non-short-circuiting: both sides must be applied
        self.set_start_date(start) | self.set_end_date(end)
    }

    pub fn set_page(&mut self, page: u32) -> Result<bool, ValidationError> {
        if page == 0 {
            return Err(ValidationError::InvalidPage);
        }
        if self.page == page {
            return Ok(false);
        }
        self.page = page;
        Ok(true)
    }

    /// Back to page 1. Returns `false` when already there.
    pub fn reset_page(&mut self) -> bool {
        if self.page == 1 {
            return false;
        }
        self.page = 1;
        true
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_date > self.end_date {
            return Err(ValidationError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Query parameters for `GET /api/expenses/`. Fails for an inverted range.
    pub fn to_list_query(&self) -> Result<ListQuery, ValidationError> {
        self.validate()?;
        Ok(ListQuery {
            page: self.page,
            sort: SORT_DATE_DESC,
            start_date: self.start_date,
            end_date: self.end_date,
            category: self.category.category(),
        })
    }
}

/// Serialized as the list endpoint's query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub page: u32,
    pub sort: &'static str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn on_page(page: u32) -> QueryFilter {
        let mut f = QueryFilter::new(d(1, 1), d(1, 31));
        f.set_page(page).unwrap();
        f
    }

    #[test]
    fn test_filter_changes_reset_page() {
        let mut f = on_page(4);
        assert!(f.set_category(Category::Fuel.into()));
        assert_eq!(f.page(), 1);

        let mut f = on_page(4);
        assert!(f.set_start_date(d(1, 2)));
        assert_eq!(f.page(), 1);

        let mut f = on_page(4);
        assert!(f.set_end_date(d(1, 30)));
        assert_eq!(f.page(), 1);
    }

    #[test]
    fn test_unchanged_values_are_not_changes() {
        let mut f = on_page(3);
        assert!(!f.set_category(CategoryFilter::All));
        assert!(!f.set_start_date(d(1, 1)));
        assert!(!f.set_date_range(d(1, 1), d(1, 31)));
        assert_eq!(f.page(), 3);
        assert_eq!(f.set_page(3), Ok(false));
    }

    #[test]
    fn test_set_date_range_applies_both_ends() {
        let mut f = on_page(2);
        assert!(f.set_date_range(d(1, 1), d(2, 29)));
        assert_eq!(f.end_date(), d(2, 29));
        assert_eq!(f.page(), 1);
    }

    #[test]
    fn test_page_zero_rejected() {
        let mut f = on_page(1);
        assert_eq!(f.set_page(0), Err(ValidationError::InvalidPage));
        assert_eq!(f.page(), 1);
    }

    #[test]
    fn test_inverted_range_rejected_for_every_category_and_page() {
        for category in std::iter::once(CategoryFilter::All)
            .chain(Category::ALL.into_iter().map(CategoryFilter::Only))
        {
            for page in [1, 2, 9] {
                let mut f = QueryFilter::new(d(1, 1), d(1, 31));
                f.set_category(category);
                f.set_page(page).unwrap();
                f.set_start_date(d(2, 1));
                let err = f.to_list_query().unwrap_err();
                assert_eq!(
                    err,
                    ValidationError::InvalidDateRange { start: d(2, 1), end: d(1, 31) }
                );
                assert_eq!(err.to_string(), "Start date cannot be after End date.");
            }
        }
    }

    #[test]
    fn test_same_day_range_is_valid() {
        let f = QueryFilter::new(d(1, 5), d(1, 5));
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_list_query_omits_all_category() {
        let f = QueryFilter::new(d(1, 1), d(1, 31));
        let q = serde_json::to_value(f.to_list_query().unwrap()).unwrap();
        assert_eq!(q["page"], 1);
        assert_eq!(q["sort"], "date_desc");
        assert_eq!(q["start_date"], "2024-01-01");
        assert_eq!(q["end_date"], "2024-01-31");
        assert!(q.get("category").is_none());

        let mut f = f;
        f.set_category(Category::Bills.into());
        let q = serde_json::to_value(f.to_list_query().unwrap()).unwrap();
        assert_eq!(q["category"], "Bills");
    }

    #[test]
    fn test_month_to_date() {
        let f = QueryFilter::month_to_date(d(3, 17));
        assert_eq!(f.start_date(), d(3, 1));
        assert_eq!(f.end_date(), d(3, 17));
        assert_eq!(f.category(), CategoryFilter::All);
        assert_eq!(f.page(), 1);
    }

    #[test]
    fn test_category_filter_parse() {
        assert_eq!("All".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "fuel".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Fuel)
        );
        assert!("nope".parse::<CategoryFilter>().is_err());
    }
}
