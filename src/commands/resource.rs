//! Resource sharing commands

use super::{print_json, AppContext};
use crate::cli::ResourceCommand;
use crate::error::{Result, StudySyncError};
use colored::Colorize;
use prettytable::{row, Table};

/// Handle `resource share|list`
pub fn handle_resource(ctx: &AppContext, command: ResourceCommand) -> Result<()> {
    let service = ctx.resources()?;
    match command {
        ResourceCommand::Share {
            session,
            user,
            file,
            link,
        } => {
            let resource = match (file, link) {
                (Some(path), _) => {
                    let bytes = std::fs::read(&path)?;
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    service.share_file(&session, &user, &name, &bytes)?
                }
                (None, Some(link)) => service.share_link(&session, &user, &link)?,
                (None, None) => {
                    return Err(StudySyncError::InvalidResource(
                        "provide a file or a link".to_string(),
                    )
                    .into())
                }
            };
            let shown = resource
                .file_url
                .or(resource.link)
                .unwrap_or_default();
            println!("{} Shared {}", "✓".green(), shown);
        }
        ResourceCommand::List { session, json } => {
            let resources = service.list(&session)?;
            if json {
                return print_json(&resources);
            }
            if resources.is_empty() {
                println!("No resources shared yet.");
                return Ok(());
            }

            let mut table = Table::new();
            table.add_row(row!["Kind", "Name", "URL", "Shared by", "When"]);
            for r in &resources {
                let (kind, name, url) = if r.is_file() {
                    (
                        "file",
                        r.filename.clone().unwrap_or_default(),
                        r.file_url.clone().unwrap_or_default(),
                    )
                } else {
                    ("link", String::new(), r.link.clone().unwrap_or_default())
                };
                table.add_row(row![
                    kind,
                    name,
                    url,
                    r.uploader,
                    r.timestamp.format("%Y-%m-%d %H:%M")
                ]);
            }
            println!();
            table.printstd();
            println!();
        }
    }
    Ok(())
}
