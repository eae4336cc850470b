//! Local filtering and ordering of the project marketplace.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::models::ProjectListing;
use crate::api::service::DiscoveryService;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    DeadlineSoonest,
    Newest,
    BudgetHighest,
    BudgetLowest,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deadline" => Ok(SortKey::DeadlineSoonest),
            "newest" => Ok(SortKey::Newest),
            "budget-high" => Ok(SortKey::BudgetHighest),
            "budget-low" => Ok(SortKey::BudgetLowest),
            other => Err(format!(
                "unknown sort `{other}` (expected deadline, newest, budget-high or budget-low)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFilter {
    pub query: Option<String>,
    pub trades: Vec<String>,
    pub min_budget: Option<f64>,
    pub max_budget: Option<f64>,
    pub location: Option<String>,
    pub nigp_prefix: Option<String>,
    pub include_closed: bool,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl ProjectFilter {
    pub fn matches(&self, listing: &ProjectListing, today: NaiveDate) -> bool {
        if let Some(q) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if !contains_ci(&listing.title, q) && !contains_ci(&listing.description, q) {
                return false;
            }
        }
        if !self.trades.is_empty()
            && !listing
                .trades
                .iter()
                .any(|t| self.trades.iter().any(|want| t.trim().eq_ignore_ascii_case(want.trim())))
        {
            return false;
        }
        // Budget ranges only need to overlap the requested window.
        if let Some(min) = self.min_budget {
            match listing.budget_ceiling() {
                Some(ceiling) if ceiling >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.max_budget {
            match listing.budget_floor() {
                Some(floor) if floor <= max => {}
                _ => return false,
            }
        }
        if let Some(loc) = self.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            if !listing.location.as_deref().is_some_and(|l| contains_ci(l, loc)) {
                return false;
            }
        }
        if let Some(prefix) = self.nigp_prefix.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            if !listing.nigp_code.as_deref().is_some_and(|c| c.trim().starts_with(prefix)) {
                return false;
            }
        }
        if !self.include_closed && listing.deadline.is_some_and(|d| d < today) {
            return false;
        }
        true
    }
}

/// Present values first, then missing ones.
fn some_first<T>(a: Option<T>, b: Option<T>, cmp: impl FnOnce(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn compare(a: &ProjectListing, b: &ProjectListing, sort: SortKey) -> Ordering {
    match sort {
        SortKey::DeadlineSoonest => some_first(a.deadline, b.deadline, |x, y| x.cmp(&y)),
        SortKey::Newest => some_first(a.posted_at, b.posted_at, |x, y| y.cmp(&x)),
        SortKey::BudgetHighest => {
            some_first(a.budget_ceiling(), b.budget_ceiling(), |x, y| y.total_cmp(&x))
        }
        SortKey::BudgetLowest => {
            some_first(a.budget_floor(), b.budget_floor(), |x, y| x.total_cmp(&y))
        }
    }
}

/// Filter then stable-sort, so ties keep the backend's order.
pub fn filter_and_sort(
    listings: &[ProjectListing],
    filter: &ProjectFilter,
    sort: SortKey,
    today: NaiveDate,
) -> Vec<ProjectListing> {
    let mut out: Vec<ProjectListing> = listings
        .iter()
        .filter(|l| filter.matches(l, today))
        .cloned()
        .collect();
    out.sort_by(|a, b| compare(a, b, sort));
    out
}

/// Cached marketplace listings; refetched on demand, filtered locally.
pub struct ProjectBoard {
    service: Arc<dyn DiscoveryService>,
    listings: Vec<ProjectListing>,
}

impl ProjectBoard {
    pub fn new(service: Arc<dyn DiscoveryService>) -> Self {
        Self {
            service,
            listings: Vec::new(),
        }
    }

    pub async fn refresh(&mut self) -> Result<usize> {
        self.listings = self.service.get_project_discovery().await?;
        Ok(self.listings.len())
    }

    pub fn listings(&self) -> &[ProjectListing] {
        &self.listings
    }

    pub fn view(&self, filter: &ProjectFilter, sort: SortKey, today: NaiveDate) -> Vec<ProjectListing> {
        filter_and_sort(&self.listings, filter, sort, today)
    }

    /// Every trade that appears on the board, for building filter choices.
    pub fn trades(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .listings
            .iter()
            .flat_map(|l| l.trades.iter().map(|t| t.trim().to_string()))
            .filter(|t| !t.is_empty())
            .collect();
        all.sort_by_key(|t| t.to_lowercase());
        all.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ProjectId;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn listing(id: &str, title: &str) -> ProjectListing {
        ProjectListing {
            id: ProjectId::new(id),
            title: title.to_string(),
            description: String::new(),
            budget_min: None,
            budget_max: None,
            trades: vec![],
            deadline: None,
            nigp_code: None,
            location: None,
            posted_at: None,
        }
    }

    fn board() -> Vec<ProjectListing> {
        let mut roof = listing("1", "Library roof replacement");
        roof.trades = vec!["Roofing".into()];
        roof.budget_min = Some(80_000.0);
        roof.budget_max = Some(120_000.0);
        roof.deadline = Some(day(2025, 7, 1));
        roof.location = Some("Austin, TX".into());
        roof.nigp_code = Some("91448".into());
        roof.posted_at = Some(Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap());

        let mut paint = listing("2", "Interior painting");
        paint.description = "Two story office, low VOC".into();
        paint.trades = vec!["Painting".into(), "Drywall".into()];
        paint.budget_max = Some(15_000.0);
        paint.deadline = Some(day(2025, 6, 10));
        paint.location = Some("Dallas, TX".into());
        paint.posted_at = Some(Utc.with_ymd_and_hms(2025, 5, 20, 0, 0, 0).unwrap());

        let mut old = listing("3", "Parking lot striping");
        old.trades = vec!["painting".into()];
        old.budget_min = Some(5_000.0);
        old.deadline = Some(day(2025, 4, 1));

        let open = listing("4", "Homeowner deck repair");
        vec![roof, paint, old, open]
    }

    fn ids(list: &[ProjectListing]) -> Vec<&str> {
        list.iter().map(|l| l.id.as_str()).collect()
    }

    fn today() -> NaiveDate {
        day(2025, 6, 1)
    }

    #[test]
    fn default_view_hides_closed_and_sorts_by_deadline() {
        let out = filter_and_sort(&board(), &ProjectFilter::default(), SortKey::DeadlineSoonest, today());
        assert_eq!(ids(&out), vec!["2", "1", "4"]);
    }

    #[test]
    fn include_closed_brings_back_past_deadlines() {
        let filter = ProjectFilter {
            include_closed: true,
            ..Default::default()
        };
        let out = filter_and_sort(&board(), &filter, SortKey::DeadlineSoonest, today());
        assert_eq!(ids(&out), vec!["3", "2", "1", "4"]);
    }

    #[test]
    fn trade_filter_is_case_insensitive() {
        let filter = ProjectFilter {
            trades: vec!["PAINTING".into()],
            include_closed: true,
            ..Default::default()
        };
        let out = filter_and_sort(&board(), &filter, SortKey::Newest, today());
        assert_eq!(ids(&out), vec!["2", "3"]);
    }

    #[test]
    fn query_searches_description() {
        let filter = ProjectFilter {
            query: Some("voc".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_sort(&board(), &filter, SortKey::Newest, today())), vec!["2"]);
    }

    #[test]
    fn budget_window_uses_overlap() {
        let filter = ProjectFilter {
            min_budget: Some(10_000.0),
            max_budget: Some(90_000.0),
            ..Default::default()
        };
        let out = filter_and_sort(&board(), &filter, SortKey::BudgetHighest, today());
        assert_eq!(ids(&out), vec!["1", "2"]);
    }

    #[test]
    fn location_and_nigp_filters() {
        let filter = ProjectFilter {
            location: Some("austin".into()),
            nigp_prefix: Some("914".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_sort(&board(), &filter, SortKey::Newest, today())), vec!["1"]);
    }

    #[test]
    fn budget_sorts_put_unknown_budgets_last() {
        let all = ProjectFilter {
            include_closed: true,
            ..Default::default()
        };
        let high = filter_and_sort(&board(), &all, SortKey::BudgetHighest, today());
        assert_eq!(ids(&high), vec!["1", "2", "3", "4"]);
        let low = filter_and_sort(&board(), &all, SortKey::BudgetLowest, today());
        assert_eq!(ids(&low), vec!["3", "2", "1", "4"]);
    }

    #[test]
    fn sort_key_parses_cli_names() {
        assert_eq!("budget-high".parse::<SortKey>(), Ok(SortKey::BudgetHighest));
        assert!("cheapest".parse::<SortKey>().is_err());
    }

    struct Fixed(Vec<ProjectListing>);

    #[async_trait]
    impl DiscoveryService for Fixed {
        async fn get_project_discovery(&self) -> Result<Vec<ProjectListing>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn board_refresh_and_trades() {
        let mut b = ProjectBoard::new(Arc::new(Fixed(board())));
        assert_eq!(b.refresh().await.unwrap(), 4);
        assert_eq!(b.trades(), vec!["Drywall", "Painting", "Roofing"]);
        let view = b.view(&ProjectFilter::default(), SortKey::Newest, today());
        assert_eq!(ids(&view), vec!["2", "1", "4"]);
    }
}
