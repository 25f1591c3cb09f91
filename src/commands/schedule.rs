//! Proposal, tally and finalization commands

use super::{print_json, AppContext};
use crate::error::Result;
use crate::finalize::{Decision, FinalizeChoice, Tally};
use crate::slot::{parse_slots, Slot};
use colored::Colorize;
use prettytable::{row, Table};

/// Handle `propose`
pub fn run_propose(ctx: &AppContext, session_id: &str, user: &str, raw_slots: &[String]) -> Result<()> {
    let slots = parse_slots(raw_slots)?;
    let proposal = ctx.ledger().propose_slots(session_id, user, slots)?;
    println!(
        "{} Recorded {} slot(s) from {}",
        "✓".green(),
        proposal.slots.len(),
        proposal.user.bold()
    );
    Ok(())
}

/// Handle `tally`
pub fn run_tally(ctx: &AppContext, session_id: &str, json: bool) -> Result<()> {
    let tally = ctx.finalization()?.tally_and_decide(session_id)?;
    if json {
        return print_json(&tally);
    }
    output_tally(&tally);
    Ok(())
}

/// Handle `finalize`
pub async fn run_finalize(
    ctx: &AppContext,
    session_id: &str,
    host: &str,
    auto: bool,
    slot: Option<&str>,
) -> Result<()> {
    let choice = match slot {
        Some(raw) if !auto => FinalizeChoice::Manual(raw.parse::<Slot>()?),
        _ => FinalizeChoice::AutoCandidate,
    };

    let outcome = ctx.finalization()?.finalize(session_id, host, choice).await?;
    let confirmed = outcome
        .session
        .final_slot
        .map(|s| s.to_string())
        .unwrap_or_default();
    println!(
        "{} {} confirmed for {}",
        "✓".green(),
        outcome.session.title.bold(),
        confirmed.bold()
    );
    println!(
        "Notifications: {} delivered, {} failed",
        outcome.report.delivered.len(),
        outcome.report.failed.len()
    );
    for failure in &outcome.report.failed {
        println!("  {} {}: {}", "✗".red(), failure.recipient, failure.reason);
    }
    Ok(())
}

fn output_tally(tally: &Tally) {
    if tally.counts.is_empty() {
        println!("No slots proposed yet.");
        return;
    }

    let mut table = Table::new();
    table.add_row(row!["Slot", "Votes"]);
    for count in &tally.counts {
        table.add_row(row![count.slot, count.count]);
    }
    println!();
    table.printstd();
    println!();

    match &tally.decision {
        Decision::MajorityFound { candidate } => {
            println!("{} Majority slot found: {}", "✓".green(), candidate.to_string().bold());
            println!("Confirm it with `studysync finalize --auto`.");
        }
        Decision::NoMajority { .. } => {
            println!(
                "{} No clear majority. The host must pick one slot with `studysync finalize --slot`.",
                "!".yellow()
            );
        }
    }
}
