//! sitemill - XML sitemap generator and server.

mod cli;
mod config;
mod core;
mod embed;
mod freshness;
mod generator;
mod logger;
mod rebuild;
mod server;
mod store;
mod tracker;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::common::App;
use cli::rebuild::RebuildRequest;
use cli::{Cli, Commands, CustomAction};
use config::{SiteConfig, init_config};
use store::OverrideChange;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = init_config(SiteConfig::load(&cli)?);

    if let Commands::Init { site_url, force, .. } = &cli.command {
        return cli::init::new_project(&config, site_url, *force).map(|_| ());
    }

    let app = App::open(config)?;
    run_command(&app, &cli.command)
}

fn run_command(app: &App, command: &Commands) -> Result<()> {
    match command {
        Commands::Init { .. } => unreachable!("handled before the store is opened"),
        Commands::Rebuild {
            types,
            no_preserve_custom,
            force,
            queue,
        } => {
            let request = RebuildRequest {
                types: types.as_slice(),
                preserve_custom: !no_preserve_custom,
                force: *force,
                queue: *queue,
            };
            cli::rebuild::rebuild(app, &request).map(|_| ())
        }
        Commands::Regenerate => cli::rebuild::regenerate(app).map(|_| ()),
        Commands::Cron { .. } => cli::state::cron(app).map(|_| ()),
        Commands::Cancel => cli::state::cancel(app).map(|_| ()),
        Commands::Status { json } => cli::status::show(app, *json),
        Commands::Serve { .. } => cli::serve::serve(app),
        Commands::Custom { action } => run_custom(app, action),
        Commands::Override {
            loc,
            language,
            priority,
            changefreq,
            visible,
            clear,
        } => {
            let change = OverrideChange {
                priority: *priority,
                changefreq: *changefreq,
                visible: *visible,
            };
            cli::overrides::apply(app, loc, language.as_deref(), change, *clear).map(|_| ())
        }
        Commands::DevMode { state } => cli::state::dev_mode(app, *state),
        Commands::Mark { what } => cli::state::mark(app, *what),
    }
}

fn run_custom(app: &App, action: &CustomAction) -> Result<()> {
    match action {
        CustomAction::List { sort, order, page } => {
            cli::custom::list(app, *sort, *order, *page).map(|_| ())
        }
        CustomAction::Add { loc, fields } => cli::custom::add(app, loc, fields).map(|_| ()),
        CustomAction::Edit { id, loc, fields } => {
            cli::custom::edit(app, *id, loc.as_deref(), fields).map(|_| ())
        }
        CustomAction::Remove { id } => cli::custom::remove(app, *id).map(|_| ()),
    }
}
