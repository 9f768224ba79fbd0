use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use tokensync_core::CollectionSelector;
use tokensync_core::TextScope;
use tokensync_core::TokenSyncError;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Sync text variables from an external database and bind them to document text.",
	long_about = "tokensync mirrors the rows of an external database into a collection of string \
	              variables, one mode per value column, and binds those variables to text whose \
	              content matches one of their values.\n\nIt works on a JSON snapshot of the \
	              design document and keeps client data (settings and the library cache) in a \
	              separate JSON file.\n\nQuick start:\n  tokensync sync         Mirror source \
	              rows into a collection\n  tokensync apply        Bind matching variables to \
	              text\n  tokensync audit        Show which text is bound\n  tokensync \
	              collections  List local and library collections"
)]
pub struct TokenSyncCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory, where `tokensync.toml` is looked
	/// up.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Path to the JSON document snapshot. Overrides `storage.document`.
	#[arg(long, short, global = true)]
	pub document: Option<PathBuf>,

	/// Path to the JSON client storage file. Overrides `storage.client`.
	#[arg(long, global = true)]
	pub client: Option<PathBuf>,

	/// Output format. Use `text` for human-readable output or `json` for
	/// programmatic consumption.
	#[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Mirror the rows of a saved database query into a variable collection.
	///
	/// Creates the collection when it does not exist, makes its modes match
	/// the value properties (the first one becomes the default mode), creates
	/// or updates one string variable per row, and removes variables that no
	/// row carries any more. Rows with a key already taken are renamed to
	/// `[Duplicated] <key> (<row id>)`.
	Sync {
		/// Saved query response (one object or an array of pages). Overrides
		/// `sync.source`.
		#[arg(long)]
		source: Option<PathBuf>,

		/// Name of the collection to sync into.
		#[arg(long)]
		collection: Option<String>,

		/// Source property holding each row's key.
		#[arg(long)]
		key_property: Option<String>,

		/// Source properties holding the values, in mode order.
		#[arg(long = "values", value_delimiter = ',')]
		value_properties: Vec<String>,

		/// Store the resolved source settings in the document.
		#[arg(long, default_value_t = false)]
		save: bool,
	},
	/// Bind variables to text whose content equals one of their values.
	///
	/// Content is compared after collapsing whitespace. Text owned by a
	/// component instance is bound through the instance property it
	/// references, so per-instance overrides survive.
	///
	/// With `--variable`, binds that one variable to every selected text
	/// layer instead.
	Apply {
		/// Which text to look at.
		#[arg(long, value_enum)]
		scope: Option<ScopeArg>,

		/// Where candidate variables come from: `all`,
		/// `local:<collection id>`, or `library:<collection key>`.
		#[arg(long, value_parser = parse_collection_selector)]
		collection: Option<CollectionSelector>,

		/// Skip text inside component definitions.
		#[arg(long, default_value_t = false)]
		no_components: bool,

		/// Include text owned by component instances.
		#[arg(long, default_value_t = false)]
		instances: bool,

		/// Only consider variables whose name contains this text.
		#[arg(long)]
		name_filter: Option<String>,

		/// Bind this variable (by name or id) to the selected text layers.
		#[arg(long)]
		variable: Option<String>,

		/// Remember the resolved options in client storage.
		#[arg(long, default_value_t = false)]
		save: bool,
	},
	/// Report which text is driven by a variable.
	Audit {
		/// Which text to look at.
		#[arg(long, value_enum)]
		scope: Option<ScopeArg>,
	},
	/// List local collections with their modes and the available library
	/// collections.
	Collections,
	/// Inspect or clear cached library collections.
	Cache {
		#[command(subcommand)]
		action: CacheCommand,
	},
}

#[derive(Subcommand)]
pub enum CacheCommand {
	/// List cached library collections.
	Show,
	/// Remove a cached library collection, or every one when no key is
	/// given.
	Clear {
		/// Library collection key.
		key: Option<String>,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
	/// Selected text layers and text inside selected containers.
	Selection,
	/// Every text layer on the current page.
	CurrentPage,
	/// Every text layer in the document.
	AllPages,
}

impl From<ScopeArg> for TextScope {
	fn from(value: ScopeArg) -> Self {
		match value {
			ScopeArg::Selection => Self::Selection,
			ScopeArg::CurrentPage => Self::CurrentPage,
			ScopeArg::AllPages => Self::AllPages,
		}
	}
}

fn parse_collection_selector(value: &str) -> Result<CollectionSelector, TokenSyncError> {
	value.parse()
}
