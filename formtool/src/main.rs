use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use formtool::{
    config::{CONFIG_FILE, FormtoolConfig, Overrides, config_schema},
    ctx::FormContext,
    render::render_tree,
    utils::parse_assignment,
};
use log::info;

/// Inspect and edit data through a JSON Schema and UI Schema.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file [default: ./.formtool.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// JSON Schema file
    #[arg(short, long, global = true)]
    schema: Option<String>,
    /// UI Schema file
    #[arg(short, long, global = true)]
    uischema: Option<String>,
    /// Data file (.json or .toml)
    #[arg(short, long, global = true)]
    data: Option<String>,
    /// Render all controls disabled and refuse edits
    #[arg(long, global = true)]
    readonly: bool,
    /// Do not keep a backup of the data file
    #[arg(long, global = true)]
    no_backup: bool,
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Subcommand, Debug)]
enum SubCommands {
    /// Show the control chosen for every element
    Render,
    /// Set values: `formtool set foo=13 address/city=Berlin`
    Set {
        #[arg(required = true)]
        assignments: Vec<String>,
        /// Print the result without writing the data file
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the UI Schema in use (generated when none is given)
    Uischema,
    /// Print the JSON Schema of the config file
    ConfigSchema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    if let SubCommands::ConfigSchema = cli.command {
        println!("{}", serde_json::to_string_pretty(&config_schema())?);
        return Ok(());
    }

    let workdir = std::env::current_dir()?;
    let config_path = cli.config.clone().unwrap_or_else(|| workdir.join(CONFIG_FILE));
    let base = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| workdir.clone());

    let mut config = FormtoolConfig::load(&config_path).await?;
    config.apply(Overrides {
        schema: cli.schema,
        uischema: cli.uischema,
        data: cli.data,
        readonly: cli.readonly,
        no_backup: cli.no_backup,
    });

    let mut ctx = FormContext::load(config, &base).await?;

    match cli.command {
        SubCommands::Render => {
            print!("{}", render_tree(&ctx.render()));
        }
        SubCommands::Set {
            assignments,
            dry_run,
        } => {
            let parsed = assignments
                .iter()
                .map(|a| parse_assignment(a))
                .collect::<anyhow::Result<Vec<_>>>()?;
            ctx.apply(&parsed)?;
            print!("{}", render_tree(&ctx.render()));
            if dry_run {
                info!("dry run, data file left untouched");
            } else if let Some(path) = ctx.save().await.context("Failed to save data")? {
                println!("{} {}", "saved".green().bold(), path.display());
            }
        }
        SubCommands::Uischema => {
            let ui = ctx
                .session
                .uischema()
                .map(|ui| ui.to_json())
                .unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&ui)?);
        }
        SubCommands::ConfigSchema => {}
    }

    Ok(())
}
