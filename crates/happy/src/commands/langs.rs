//! Langs command - list installed languages.

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use happy_i18n::scan_languages;
use serde::Serialize;

use super::Context;

/// Arguments for the langs command.
#[derive(Args, Debug)]
pub struct LangsArgs {}

#[derive(Serialize)]
struct LangsOutput<'a> {
    languages: &'a [String],
    default: &'a str,
}

/// Run the langs command.
pub async fn run(_args: LangsArgs, ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let root = &config.i18n.locales_dir;
    let languages = scan_languages(root)
        .with_context(|| format!("failed to scan {}", root.display()))?;
    let default = config.i18n.default_lang.as_str();

    if ctx.json_output {
        let output = LangsOutput {
            languages: &languages,
            default,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Languages").bold());
    println!("{}", dim.apply_to("─".repeat(30)));

    if languages.is_empty() {
        println!("{}", dim.apply_to(format!("No catalogs under {}", root.display())));
        return Ok(());
    }

    for lang in &languages {
        if lang == default {
            println!("{lang} {}", dim.apply_to("(default)"));
        } else {
            println!("{lang}");
        }
    }
    if !languages.iter().any(|l| l == default) {
        let yellow = Style::new().yellow();
        println!();
        println!(
            "{} default language '{default}' is not installed",
            yellow.apply_to("Warning:")
        );
    }
    Ok(())
}
