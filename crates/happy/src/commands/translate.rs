//! Translate command - resolve a message through the catalog pool.

use anyhow::Result;
use clap::Args;

use super::Context;

/// Arguments for the translate command.
#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Language code, e.g. "fa"
    pub lang: String,

    /// Message domain (catalog name)
    pub domain: String,

    /// Message id
    pub msgid: String,
}

/// Run the translate command.
pub async fn run(args: TranslateArgs, ctx: &Context) -> Result<()> {
    let bot = ctx.bot()?;
    let text = bot
        .catalogs()
        .translate(&args.domain, &args.lang, &args.msgid)
        .await?;

    if ctx.json_output {
        let output = serde_json::json!({
            "lang": args.lang,
            "domain": args.domain,
            "msgid": args.msgid,
            "text": text,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{text}");
    }

    bot.shutdown().await?;
    Ok(())
}
