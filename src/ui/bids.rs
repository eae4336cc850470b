use std::sync::Arc;

use crate::api::client::ApiClient;
use crate::api::models::{BidDto, BidId, ProjectId};
use crate::app::Settings;
use crate::bids::{BidComposer, BidManager};
use crate::cli::BidsCommand;
use crate::error::{ClientError, Result, SubmitError};
use crate::utils::format_money;

pub fn format_row(bid: &BidDto) -> String {
    let project = bid
        .project_title
        .clone()
        .unwrap_or_else(|| format!("project {}", bid.project_id));
    format!(
        "{:<10} {:<10} {:>14}  {}",
        bid.id.as_str(),
        bid.status.as_str(),
        format_money(bid.total()),
        project
    )
}

pub fn format_detail(bid: &BidDto) -> String {
    let mut out = vec![format_row(bid)];
    for item in &bid.items {
        out.push(format!("  - {:<40} {:>14}", item.name, format_money(item.price)));
        if let Some(desc) = &item.description {
            out.push(format!("      {desc}"));
        }
    }
    for (label, text) in [
        ("Notes", &bid.notes),
        ("Credentials", &bid.credentials),
        ("Experience", &bid.relevant_experience),
    ] {
        if let Some(text) = text {
            out.push(format!("{label}: {text}"));
        }
    }
    if bid.status.is_editable() {
        out.push("(draft, line items can still be edited)".to_string());
    }
    out.join("\n")
}

fn submit_failure(err: SubmitError) -> ClientError {
    match err {
        SubmitError::Invalid(message) => ClientError::Invalid(message),
        SubmitError::CreateFailed(source) => source,
        SubmitError::FinalizeFailed { bid_id, source } => {
            eprintln!("Draft {bid_id} was kept; run `tradeboard bids finalize {bid_id}` to retry.");
            source
        }
    }
}

pub async fn run(settings: &Settings, action: BidsCommand) -> Result<()> {
    let client = Arc::new(ApiClient::from_settings(settings)?);
    let mut manager = BidManager::new(client.clone());

    match action {
        BidsCommand::List { status } => {
            manager.refresh().await?;
            let rows: Vec<&BidDto> = match status {
                Some(status) => manager.with_status(status).collect(),
                None => manager.bids().iter().collect(),
            };
            if rows.is_empty() {
                println!("No bids.");
            }
            for bid in rows {
                println!("{}", format_row(bid));
            }
        }
        BidsCommand::Show { id } => {
            let bid = manager.detail(&BidId::new(id)).await?;
            println!("{}", format_detail(&bid));
        }
        BidsCommand::Submit { project, file } => {
            let composer = BidComposer::from_draft_file(&file)?;
            println!("Total: {}", format_money(composer.total()));
            let bid = composer
                .submit(client.as_ref(), &ProjectId::new(project))
                .await
                .map_err(submit_failure)?;
            println!("Submitted bid {} ({})", bid.id, bid.status);
        }
        BidsCommand::EditItems { id, file } => {
            let composer = BidComposer::from_draft_file(&file)?;
            let bid = manager.update_items(&BidId::new(id), &composer).await?;
            println!("{}", format_detail(&bid));
        }
        BidsCommand::Finalize { id } => {
            let bid = manager.finalize(&BidId::new(id)).await?;
            println!("Bid {} is now {}", bid.id, bid.status);
        }
        BidsCommand::Withdraw { id } => {
            let bid = manager.withdraw(&BidId::new(id)).await?;
            println!("Bid {} is now {}", bid.id, bid.status);
        }
        BidsCommand::Delete { id } => {
            let id = BidId::new(id);
            manager.delete(&id).await?;
            println!("Deleted bid {id}");
        }
    }
    Ok(())
}
