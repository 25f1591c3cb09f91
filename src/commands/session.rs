//! Session commands
//!
//! Creation input is validated here before it reaches the store: a title
//! and at least one well-formed participant address are required.

use super::{print_json, AppContext};
use crate::cli::SessionCommand;
use crate::error::{Result, StudySyncError};
use crate::storage::{NewSession, Session};
use chrono::NaiveDate;
use colored::Colorize;
use prettytable::{row, Table};
use regex::Regex;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Split a comma-separated participant list
///
/// Entries are trimmed, blanks dropped and exact duplicates removed while
/// keeping the first occurrence.
///
/// # Errors
///
/// Returns `InvalidSession` when no participant remains or an entry is not
/// an email address.
///
/// # Examples
///
/// ```
/// use studysync::commands::session::parse_participants;
///
/// let list = parse_participants(" a@x.com, ,b@x.com ").unwrap();
/// assert_eq!(list, vec!["a@x.com", "b@x.com"]);
/// ```
pub fn parse_participants(raw: &str) -> Result<Vec<String>> {
    let email = Regex::new(EMAIL_PATTERN)
        .map_err(|e| anyhow::anyhow!("Invalid email pattern: {}", e))?;

    let mut participants: Vec<String> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !email.is_match(entry) {
            return Err(StudySyncError::InvalidSession(format!(
                "'{}' is not an email address",
                entry
            ))
            .into());
        }
        if !participants.iter().any(|p| p == entry) {
            participants.push(entry.to_string());
        }
    }

    if participants.is_empty() {
        return Err(StudySyncError::InvalidSession(
            "at least one participant is required".to_string(),
        )
        .into());
    }
    Ok(participants)
}

/// Build validated creation input
///
/// # Errors
///
/// Returns `InvalidSession` for a blank title or bad participant list.
pub fn build_new_session(
    host: &str,
    title: &str,
    description: &str,
    participants: &str,
    deadline: NaiveDate,
) -> Result<NewSession> {
    let title = title.trim();
    if title.is_empty() {
        return Err(StudySyncError::InvalidSession("title is required".to_string()).into());
    }
    let host = host.trim();
    if host.is_empty() {
        return Err(StudySyncError::InvalidSession("host email is required".to_string()).into());
    }

    Ok(NewSession {
        host_email: host.to_string(),
        title: title.to_string(),
        description: description.trim().to_string(),
        participants: parse_participants(participants)?,
        propose_deadline: deadline,
    })
}

/// Handle `session create|list|show`
pub fn handle_session(ctx: &AppContext, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Create {
            host,
            title,
            description,
            participants,
            deadline,
        } => {
            let input = build_new_session(&host, &title, &description, &participants, deadline)?;
            let id = ctx.sessions.create_session(input)?;
            println!("{} Session created: {}", "✓".green(), id.bold());
        }
        SessionCommand::List { user, hosted, json } => {
            let sessions = if hosted {
                ctx.sessions.get_sessions_hosted_by(&user)?
            } else {
                ctx.sessions.get_sessions_for_user(&user)?
            };
            if json {
                print_json(&sessions)?;
            } else if sessions.is_empty() {
                println!("No sessions found.");
            } else {
                output_sessions_table(&sessions);
            }
        }
        SessionCommand::Show { id, json } => {
            let session = ctx.sessions.get_session_by_id(&id)?;
            if json {
                print_json(&session)?;
            } else {
                output_session_details(&session);
            }
        }
    }
    Ok(())
}

fn status_label(session: &Session) -> String {
    match &session.final_slot {
        Some(slot) => format!("confirmed {}", slot),
        None => "open".to_string(),
    }
}

fn output_sessions_table(sessions: &[Session]) {
    let mut table = Table::new();
    table.add_row(row!["ID", "Title", "Host", "Deadline", "Proposals", "Status"]);
    for session in sessions {
        table.add_row(row![
            session.id,
            session.title,
            session.host_email,
            session.propose_deadline,
            session.proposed_slots.len(),
            status_label(session)
        ]);
    }
    println!();
    table.printstd();
    println!();
}

fn output_session_details(session: &Session) {
    println!("\n{}\n", session.title.bold());
    println!("ID:            {}", session.id);
    println!("Host:          {}", session.host_email);
    if !session.description.is_empty() {
        println!("Description:   {}", session.description);
    }
    println!("Participants:  {}", session.participants.join(", "));
    println!("Deadline:      {}", session.propose_deadline);
    match &session.final_slot {
        Some(slot) => println!("Status:        {} {}", "confirmed".green(), slot),
        None => println!("Status:        {}", "open".yellow()),
    }

    if !session.proposed_slots.is_empty() {
        let mut table = Table::new();
        table.add_row(row!["User", "Slots", "Submitted"]);
        for proposal in &session.proposed_slots {
            let slots = proposal
                .slots
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            table.add_row(row![
                proposal.user,
                slots,
                proposal.submitted_at.format("%Y-%m-%d %H:%M")
            ]);
        }
        println!("\nProposals:");
        table.printstd();
    }
    println!();
}
