use std::sync::Arc;

use chrono::Local;

use crate::api::client::ApiClient;
use crate::api::models::ProjectListing;
use crate::app::Settings;
use crate::cli::ProjectArgs;
use crate::discovery::ProjectBoard;
use crate::error::Result;
use crate::utils::format_money;

fn budget(listing: &ProjectListing) -> String {
    match (listing.budget_min, listing.budget_max) {
        (Some(lo), Some(hi)) if lo != hi => format!("{} - {}", format_money(lo), format_money(hi)),
        (Some(v), _) | (None, Some(v)) => format_money(v),
        (None, None) => "budget n/a".to_string(),
    }
}

pub fn format_listing(listing: &ProjectListing) -> String {
    let mut head = format!("{}  {}", listing.id, listing.title);
    if let Some(location) = &listing.location {
        head.push_str(&format!("  ({location})"));
    }
    let deadline = listing
        .deadline
        .map(|d| format!("due {}", d.format("%Y-%m-%d")))
        .unwrap_or_else(|| "no deadline".to_string());
    let mut detail = format!("    {} | {}", budget(listing), deadline);
    if !listing.trades.is_empty() {
        detail.push_str(&format!(" | {}", listing.trades.join(", ")));
    }
    if let Some(code) = &listing.nigp_code {
        detail.push_str(&format!(" | NIGP {code}"));
    }
    format!("{head}\n{detail}")
}

pub async fn run(settings: &Settings, args: ProjectArgs) -> Result<()> {
    let client = Arc::new(ApiClient::from_settings(settings)?);
    let mut board = ProjectBoard::new(client);
    let total = board.refresh().await?;

    let shown = board.view(&args.filter(), args.sort, Local::now().date_naive());
    for listing in &shown {
        println!("{}", format_listing(listing));
    }
    println!("\n{} of {} projects", shown.len(), total);
    if shown.is_empty() && total > 0 {
        println!("Trades on the board: {}", board.trades().join(", "));
    }
    Ok(())
}
