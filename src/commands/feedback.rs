//! Feedback commands

use super::{print_json, AppContext};
use crate::cli::FeedbackCommand;
use crate::error::Result;
use crate::feedback::{FeedbackReport, NewFeedback};
use colored::Colorize;
use prettytable::{row, Table};

/// Handle `feedback submit|report`
pub fn handle_feedback(ctx: &AppContext, command: FeedbackCommand) -> Result<()> {
    let store = ctx.feedback()?;
    match command {
        FeedbackCommand::Submit {
            session,
            user,
            rating,
            comment,
            duration,
        } => {
            let entry = store.submit(NewFeedback {
                session_id: session,
                submitted_by: user,
                rating,
                comment,
                duration_minutes: duration,
            })?;
            println!(
                "{} Feedback for {} recorded ({}/5)",
                "✓".green(),
                entry.title.bold(),
                entry.rating
            );
        }
        FeedbackCommand::Report { json } => {
            let report = store.report()?;
            if json {
                return print_json(&report);
            }
            output_report(&report);
        }
    }
    Ok(())
}

fn output_report(report: &FeedbackReport) {
    if report.is_empty() {
        println!("No feedback data available yet.");
        return;
    }

    let mut ratings = Table::new();
    ratings.add_row(row!["Session", "Title", "Average", "Responses"]);
    for r in &report.session_ratings {
        ratings.add_row(row![
            r.session_id,
            r.title,
            format!("{:.2}", r.average_rating),
            r.responses
        ]);
    }
    println!("\n{}", "Average rating per session".bold());
    ratings.printstd();

    let mut topics = Table::new();
    topics.add_row(row!["Topic", "Sessions rated"]);
    for t in &report.topic_counts {
        topics.add_row(row![t.title, t.count]);
    }
    println!("\n{}", "Popular topics".bold());
    topics.printstd();

    if let Some(avg) = report.average_duration {
        println!("\nAverage duration:    {:.1} minutes", avg);
    }
    if let Some(rating) = report.most_common_rating {
        println!("Most common rating:  {}", rating);
    }
    println!("Total responses:     {}\n", report.total_responses);
}
