//! Account commands

use super::AppContext;
use crate::cli::UserCommand;
use crate::error::Result;
use colored::Colorize;

/// Handle `user register` and `user login`
pub fn handle_user(ctx: &AppContext, command: UserCommand) -> Result<()> {
    let credentials = ctx.credentials()?;
    match command {
        UserCommand::Register(creds) => {
            let identity = credentials.register(&creds.email, &creds.password)?;
            println!("{} Registered {}", "✓".green(), identity.email.bold());
        }
        UserCommand::Login(creds) => {
            let identity = credentials.authenticate(&creds.email, &creds.password)?;
            println!(
                "{} Logged in as {} (member since {})",
                "✓".green(),
                identity.email.bold(),
                identity.created_at.format("%Y-%m-%d")
            );
        }
    }
    Ok(())
}
