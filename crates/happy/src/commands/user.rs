//! User command - inspect and modify users through the session pool.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use happy_bot::BotContext;
use happy_store::{HOURS, UserId, UserRecord};

use super::Context;

/// Arguments for the user command.
#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// List stored user ids
    List,

    /// Show a user's record
    Show {
        /// User ID
        id: UserId,
    },

    /// Change a user's interface language
    SetLang {
        /// User ID
        id: UserId,

        /// Installed language code
        lang: String,
    },
}

/// Run the user command.
pub async fn run(args: UserArgs, ctx: &Context) -> Result<()> {
    let bot = ctx.bot()?;

    let result = match args.command {
        UserCommand::List => list(&bot, ctx).await,
        UserCommand::Show { id } => show(&bot, ctx, id).await,
        UserCommand::SetLang { id, lang } => set_lang(&bot, ctx, id, lang).await,
    };

    // Changes made above reach the store here.
    bot.shutdown().await?;
    result
}

async fn list(bot: &BotContext, ctx: &Context) -> Result<()> {
    let ids = bot.store().all_user_ids().await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&ids)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Users").bold());
    println!("{}", dim.apply_to("─".repeat(30)));
    if ids.is_empty() {
        println!("{}", dim.apply_to("No users found"));
    }
    for id in &ids {
        let admin = if bot.is_admin(*id) { " (admin)" } else { "" };
        println!("{id}{}", dim.apply_to(admin));
    }
    Ok(())
}

async fn show(bot: &BotContext, ctx: &Context, id: UserId) -> Result<()> {
    let session = bot.sessions().get(id).await?;
    print_record(&session.record, bot.is_admin(id), ctx)
}

async fn set_lang(bot: &BotContext, ctx: &Context, id: UserId, lang: String) -> Result<()> {
    if !bot.catalogs().supports(&lang) {
        bail!(
            "language '{lang}' is not installed (available: {})",
            bot.languages().join(", ")
        );
    }

    let record = bot
        .sessions()
        .update(id, |session| {
            session.record.lang = lang;
            session.record.clone()
        })
        .await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let green = Style::new().green();
        println!(
            "{} User {id} now uses '{}'",
            green.apply_to("✓"),
            record.lang
        );
    }
    Ok(())
}

fn print_record(record: &UserRecord, admin: bool, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let name = match &record.last_name {
        Some(last) => format!("{} {last}", record.first_name),
        None => record.first_name.clone(),
    };

    println!("{}", style(format!("User {}", record.user_id)).bold());
    println!("{}", dim.apply_to("─".repeat(30)));
    println!("Name:     {name}");
    println!("Language: {}", record.lang);
    println!("Phone:    {}", record.phone.as_deref().unwrap_or("-"));
    println!("Admin:    {}", if admin { "yes" } else { "no" });
    println!("Accesses: {}", record.frequencies.total());

    if ctx.verbose {
        println!();
        println!("{}", dim.apply_to("Accesses per hour"));
        for hour in 0..HOURS as u32 {
            let count = record.frequencies.count(hour);
            if count > 0 {
                println!(
                    "  {hour:02}:00  {count:>5}  {:>5.1}%",
                    record.frequencies.percent(hour) * 100.0
                );
            }
        }
    }
    Ok(())
}
