//! Plain-text views: expense table, pagination footer, category bar chart.

use tally_core::{CategorySummary, PageResult, QueryFilter};

const BAR_WIDTH: usize = 40;

pub fn money(prefix: &str, amount: f64) -> String {
    format!("{prefix}{amount:.2}")
}

pub fn expense_table(page: &PageResult, prefix: &str) -> String {
    if page.items.is_empty() {
        return "No transactions found in this range.\n".to_string();
    }

    let desc_width = page
        .items
        .iter()
        .map(|e| e.description.chars().count())
        .max()
        .unwrap_or(0)
        .max("Transaction".len());

    let mut s = format!(
        "{:<desc_width$}  {:<13}  {:<10}  {:>12}\n",
        "Transaction", "Category", "Date", "Amount"
    );
    for e in &page.items {
        s.push_str(&format!(
            "{:<desc_width$}  {:<13}  {:<10}  {:>12}\n",
            e.description,
            e.category.as_str(),
            e.date.format("%Y-%m-%d").to_string(),
            money(prefix, e.amount)
        ));
    }
    s
}

pub fn header(filter: &QueryFilter, page: &PageResult, prefix: &str) -> String {
    format!(
        "Total (selected range): {}\n{} to {} | category: {}\n",
        money(prefix, page.total),
        filter.start_date(),
        filter.end_date(),
        filter.category()
    )
}

pub fn pagination(filter: &QueryFilter, page: &PageResult) -> String {
    let prev = if page.has_prev { "< prev" } else { "      " };
    let next = if page.has_next { "next >" } else { "" };
    format!("{prev}  Page {}  {next}", filter.page()).trim_end().to_string()
}

/// Horizontal bars scaled to the largest category.
pub fn summary_chart(entries: &[CategorySummary], prefix: &str) -> String {
    if entries.is_empty() {
        return "No data to display\n".to_string();
    }

    let max = entries.iter().map(|e| e.amount).fold(0.0_f64, f64::max);
    let name_width = entries.iter().map(|e| e.name.chars().count()).max().unwrap_or(0);

    let mut s = String::new();
    for e in entries {
        let len = if max > 0.0 {
            ((e.amount.max(0.0) / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        s.push_str(&format!(
            "{:<name_width$}  {:<BAR_WIDTH$}  {}\n",
            e.name,
            "#".repeat(len),
            money(prefix, e.amount)
        ));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, amount: f64) -> CategorySummary {
        CategorySummary {
            name: name.to_string(),
            amount,
        }
    }

    #[test]
    fn test_chart_scales_to_largest() {
        let chart = summary_chart(&[entry("Food", 45.0), entry("Bills", 90.0)], "Rs.");
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines[0].matches('#').count(), BAR_WIDTH / 2);
        assert_eq!(lines[1].matches('#').count(), BAR_WIDTH);
        assert!(lines[1].ends_with("Rs.90.00"));
    }

    #[test]
    fn test_chart_empty() {
        assert_eq!(summary_chart(&[], "$"), "No data to display\n");
    }

    #[test]
    fn test_pagination_line() {
        let filter = QueryFilter::month_to_date(chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        let page = PageResult {
            has_next: true,
            ..Default::default()
        };
        assert_eq!(pagination(&filter, &page), "        Page 1  next >");
    }
}
