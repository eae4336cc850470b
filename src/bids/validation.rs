//! Field rules for bid proposals.

use crate::bids::composer::NormalizedBid;

pub const MAX_ITEM_NAME: usize = 200;
pub const MAX_ITEM_DESCRIPTION: usize = 1000;
pub const MAX_NARRATIVE: usize = 5000;

/// Collects rule violations, keeping the first occurrence of each message.
#[derive(Debug, Default)]
pub struct Issues(Vec<String>);

impl Issues {
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.0.contains(&message) {
            self.0.push(message);
        }
    }

    /// One display string, or `Ok` when nothing was flagged.
    pub fn into_result(self) -> Result<(), String> {
        if self.0.is_empty() { Ok(()) } else { Err(self.0.join("; ")) }
    }
}

fn check_length(issues: &mut Issues, label: &str, value: Option<&str>, max: usize) {
    if value.is_some_and(|v| v.chars().count() > max) {
        issues.push(format!("{label} must be at most {max} characters"));
    }
}

/// Rules for the line items alone, as used when editing a draft.
pub fn check_items(bid: &NormalizedBid, issues: &mut Issues) {
    if bid.items.is_empty() {
        issues.push("At least one line item is required");
    }
    for item in &bid.items {
        if item.name.is_empty() {
            issues.push("Item name is required");
        }
        check_length(issues, "Item name", Some(&item.name), MAX_ITEM_NAME);
        check_length(issues, "Description", item.description.as_deref(), MAX_ITEM_DESCRIPTION);
        match item.price {
            None => issues.push("Price must be a valid number"),
            Some(p) if p < 0.0 => issues.push("Price cannot be negative"),
            Some(_) => {}
        }
    }
    if bid.items.iter().all(|i| i.price.is_some()) && bid.total() <= 0.0 {
        issues.push("Bid total must be greater than zero");
    }
}

/// Full proposal rules: line items plus narrative fields.
pub fn validate(bid: &NormalizedBid) -> Result<(), String> {
    let mut issues = Issues::default();
    check_items(bid, &mut issues);
    check_length(&mut issues, "Notes", bid.notes.as_deref(), MAX_NARRATIVE);
    check_length(&mut issues, "Credentials", bid.credentials.as_deref(), MAX_NARRATIVE);
    check_length(
        &mut issues,
        "Relevant experience",
        bid.relevant_experience.as_deref(),
        MAX_NARRATIVE,
    );
    issues.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bids::composer::NormalizedItem;

    fn item(name: &str, price: Option<f64>) -> NormalizedItem {
        NormalizedItem {
            name: name.to_string(),
            description: None,
            price,
        }
    }

    fn bid(items: Vec<NormalizedItem>) -> NormalizedBid {
        NormalizedBid {
            items,
            notes: None,
            credentials: None,
            relevant_experience: None,
        }
    }

    #[test]
    fn repeated_problems_are_reported_once() {
        let err = validate(&bid(vec![item("", Some(10.0)), item("", Some(5.0))])).unwrap_err();
        assert_eq!(err, "Item name is required");
    }

    #[test]
    fn messages_keep_first_seen_order() {
        let err = validate(&bid(vec![item("", None), item("Paint", Some(-1.0))])).unwrap_err();
        assert_eq!(
            err,
            "Item name is required; Price must be a valid number; Price cannot be negative"
        );
    }

    #[test]
    fn zero_total_is_rejected() {
        let err = validate(&bid(vec![item("Site visit", Some(0.0))])).unwrap_err();
        assert_eq!(err, "Bid total must be greater than zero");
    }

    #[test]
    fn empty_item_list_is_rejected() {
        let err = validate(&bid(vec![])).unwrap_err();
        assert!(err.starts_with("At least one line item is required"));
    }

    #[test]
    fn narrative_limits_apply() {
        let mut b = bid(vec![item("Roofing", Some(100.0))]);
        b.notes = Some("x".repeat(MAX_NARRATIVE + 1));
        assert_eq!(
            validate(&b).unwrap_err(),
            format!("Notes must be at most {MAX_NARRATIVE} characters")
        );
        b.notes = Some("x".repeat(MAX_NARRATIVE));
        assert!(validate(&b).is_ok());
    }
}
