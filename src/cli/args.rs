//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::config::CONFIG_FILE;
use crate::core::{ChangeFreq, Priority};
use crate::store::{CustomSort, SortOrder};

/// XML sitemap builder and server
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// Config file path (default: sitemill.toml)
    #[arg(short = 'C', long, global = true, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a starter sitemill.toml
    #[command(visible_alias = "i")]
    Init {
        /// Project directory name/path (relative to current directory)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        name: Option<PathBuf>,

        /// Public base URL written into the config
        #[arg(short = 'U', long = "site-url", default_value = "https://example.com", value_hint = clap::ValueHint::Url)]
        site_url: String,

        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Re-enumerate links from their sources, then regenerate sitemaps
    #[command(visible_alias = "r")]
    Rebuild {
        /// Link types to rebuild (developer mode only; default: all)
        #[arg(short, long = "type", value_name = "TYPE")]
        types: Vec<String>,

        /// Drop operator overrides instead of restoring them afterwards
        #[arg(long)]
        no_preserve_custom: bool,

        /// Rebuild even when no rebuild is pending
        #[arg(short, long)]
        force: bool,

        /// Only queue the job; `sitemill cron` or `serve` runs it
        #[arg(short, long)]
        queue: bool,
    },

    /// Rewrite sitemap files from the stored links
    #[command(visible_alias = "g")]
    Regenerate,

    /// Resume a queued job, or run pending work, within a time limit
    Cron {
        /// Seconds to spend before pausing (overrides batch.time_limit)
        #[arg(short, long)]
        time_limit: Option<u64>,
    },

    /// Cancel the queued or running job
    Cancel,

    /// Show rebuild state, job progress and sitemaps
    #[command(visible_alias = "st")]
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Serve sitemaps over HTTP and run cron in the background
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage custom links
    #[command(visible_alias = "c")]
    Custom {
        #[command(subcommand)]
        action: CustomAction,
    },

    /// Override priority, change frequency or visibility of enumerated links
    Override {
        /// Link location
        loc: String,

        /// Only links in this language (default: every language)
        #[arg(short, long)]
        language: Option<String>,

        #[arg(short, long)]
        priority: Option<Priority>,

        #[arg(short = 'f', long)]
        changefreq: Option<ChangeFreq>,

        /// Include in (true) or exclude from (false) sitemaps
        #[arg(long)]
        visible: Option<bool>,

        /// Drop the override; the next rebuild restores provider values
        #[arg(long, conflicts_with_all = ["priority", "changefreq", "visible"])]
        clear: bool,
    },

    /// Turn developer mode on or off
    DevMode {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Flag work for the next cron run
    Mark {
        #[arg(value_enum)]
        what: MarkTarget,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CustomAction {
    /// List custom links, 50 per page
    #[command(visible_alias = "ls")]
    List {
        #[arg(short, long, value_enum, default_value_t)]
        sort: CustomSort,

        #[arg(short, long, value_enum, default_value_t)]
        order: SortOrder,

        #[arg(short, long, default_value_t = 1)]
        page: u64,
    },

    /// Add a custom link
    Add {
        /// Site-relative path or absolute URL on the site
        loc: String,

        #[command(flatten)]
        fields: CustomFields,
    },

    /// Edit a custom link by id
    Edit {
        id: i64,

        /// New location
        #[arg(long)]
        loc: Option<String>,

        #[command(flatten)]
        fields: CustomFields,
    },

    /// Remove a custom link by id
    #[command(visible_alias = "rm")]
    Remove { id: i64 },
}

/// Editable fields of a custom link.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CustomFields {
    #[arg(short, long)]
    pub priority: Option<Priority>,

    #[arg(short = 'f', long)]
    pub changefreq: Option<ChangeFreq>,

    /// Language code (default: language-neutral)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Include in (true) or exclude from (false) sitemaps
    #[arg(long)]
    pub visible: Option<bool>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkTarget {
    /// Links must be re-enumerated
    Rebuild,
    /// Files must be rewritten
    Regenerate,
}

impl Cli {
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sitemill").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_rebuild_args() {
        let cli = parse(&["rebuild", "-t", "posts", "--type", "catalog", "--no-preserve-custom"]);
        let Commands::Rebuild {
            types,
            no_preserve_custom,
            force,
            queue,
        } = cli.command
        else {
            panic!("expected rebuild");
        };
        assert_eq!(types, ["posts", "catalog"]);
        assert!(no_preserve_custom);
        assert!(!force && !queue);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["status", "--verbose", "-C", "site/sitemill.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("site/sitemill.toml"));
    }

    #[test]
    fn test_custom_add_parses_values() {
        let cli = parse(&["custom", "add", "/about/", "-p", "0.8", "-f", "Weekly"]);
        let Commands::Custom {
            action: CustomAction::Add { loc, fields },
        } = cli.command
        else {
            panic!("expected custom add");
        };
        assert_eq!(loc, "/about/");
        assert_eq!(fields.priority, Some(Priority::new(0.8).unwrap()));
        assert_eq!(fields.changefreq, Some(ChangeFreq::Weekly));
    }

    #[test]
    fn test_invalid_priority_rejected() {
        let args = ["sitemill", "custom", "add", "/x/", "-p", "1.5"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_override_clear_conflicts() {
        let args = ["sitemill", "override", "/x/", "--clear", "--visible", "false"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
