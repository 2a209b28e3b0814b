use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pakstore_core::domain::PlatformFilter;

pub const PAKSTORE_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const PAKSTORE_BEFORE_HELP: &str = concat!(
    "pakstore ",
    env!("CARGO_PKG_VERSION"),
    " – Pak Store for handheld devices\n\n",
    "\x1b[1;36mCatalog\x1b[0m\n",
    "  browse           List categories, or the paks available in one.\n",
    "  info             Show a pak's details, changelog and screenshots.\n\n",
    "\x1b[1;36mInstalled paks\x1b[0m\n",
    "  install          Download and install a pak.\n",
    "  updates          List installed paks with a newer catalog version.\n",
    "  update           Update one or more paks (or --all).\n",
    "  installed        List installed paks and their status.\n",
    "  uninstall        Remove an installed pak.\n\n",
    "\x1b[1;36mMaintenance\x1b[0m\n",
    "  migrate          Match legacy records to catalog identities.\n",
    "  config           Show or change store settings.\n",
);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = PAKSTORE_BEFORE_HELP,
    help_template = PAKSTORE_HELP_TEMPLATE
)]
pub struct PakStoreCli {
    #[arg(
        short,
        long,
        help = "Suppress human output; failures still print to stderr",
        global = true
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)", global = true)]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(
        long,
        help = "Show paks for every platform for this invocation",
        global = true
    )]
    pub all_platforms: bool,
    #[command(subcommand)]
    pub command: CommandCli,
}

impl PakStoreCli {
    pub fn filter_override(&self) -> Option<PlatformFilter> {
        self.all_platforms.then_some(PlatformFilter::All)
    }
}

#[derive(Subcommand, Debug)]
pub enum CommandCli {
    #[command(
        about = "List categories, or the paks available in CATEGORY.",
        override_usage = "pakstore browse [CATEGORY]"
    )]
    Browse(BrowseArgs),
    #[command(about = "List installed paks with a newer catalog version.")]
    Updates,
    #[command(about = "List installed paks and whether the catalog still knows them.")]
    Installed,
    #[command(
        about = "Show a pak's details and changelog.",
        override_usage = "pakstore info <PAK> [--screenshots]"
    )]
    Info(InfoArgs),
    #[command(
        about = "Download and install a pak.",
        override_usage = "pakstore install <PAK>"
    )]
    Install(PakArgs),
    #[command(
        about = "Update installed paks; failures are reported, the rest still update.",
        override_usage = "pakstore update <PAK>... | --all"
    )]
    Update(UpdateArgs),
    #[command(
        about = "Remove an installed pak and forget its record.",
        override_usage = "pakstore uninstall <PAK>"
    )]
    Uninstall(PakArgs),
    #[command(about = "Match legacy installation records to catalog identities.")]
    Migrate,
    #[command(
        about = "Show or change store settings.",
        override_usage = "pakstore config <show|set>",
        subcommand
    )]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct BrowseArgs {
    #[arg(value_name = "CATEGORY")]
    pub category: Option<String>,
}

#[derive(Args, Debug)]
pub struct PakArgs {
    #[arg(value_name = "PAK", help = "Catalog identifier, display name, or name")]
    pub pak: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[arg(value_name = "PAK", help = "Catalog identifier, display name, or name")]
    pub pak: String,
    #[arg(long, help = "Download screenshots into the cache directory")]
    pub screenshots: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(
        value_name = "PAK",
        required_unless_present = "all",
        conflicts_with = "all"
    )]
    pub paks: Vec<String>,
    #[arg(long, help = "Update every pak with a pending update")]
    pub all: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    #[command(about = "Print the resolved settings and persisted preferences.")]
    Show,
    #[command(about = "Persist a preference.", subcommand)]
    Set(ConfigSetCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigSetCommand {
    #[command(about = "Choose which platforms' paks are listed.")]
    PlatformFilter(PlatformFilterArgs),
}

#[derive(Args, Debug)]
pub struct PlatformFilterArgs {
    #[arg(value_enum)]
    pub value: FilterArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    #[value(name = "match_device", alias = "match-device")]
    MatchDevice,
    All,
}

impl From<FilterArg> for PlatformFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::MatchDevice => PlatformFilter::MatchDevice,
            FilterArg::All => PlatformFilter::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        PakStoreCli::command().debug_assert();
    }

    #[test]
    fn update_requires_paks_or_all() {
        assert!(PakStoreCli::try_parse_from(["pakstore", "update"]).is_err());
        assert!(PakStoreCli::try_parse_from(["pakstore", "update", "--all", "Thing"]).is_err());
        let cli = PakStoreCli::try_parse_from(["pakstore", "--all-platforms", "update", "A", "B"])
            .expect("parse");
        assert_eq!(cli.filter_override(), Some(PlatformFilter::All));
        let CommandCli::Update(args) = cli.command else {
            panic!("expected update");
        };
        assert_eq!(args.paks, vec!["A", "B"]);
    }

    #[test]
    fn platform_filter_values() {
        let cli = PakStoreCli::try_parse_from([
            "pakstore",
            "config",
            "set",
            "platform-filter",
            "match-device",
        ])
        .expect("parse");
        let CommandCli::Config(ConfigCommand::Set(ConfigSetCommand::PlatformFilter(args))) =
            cli.command
        else {
            panic!("expected config set");
        };
        assert_eq!(PlatformFilter::from(args.value), PlatformFilter::MatchDevice);
    }
}
