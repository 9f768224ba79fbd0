use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use tokensync_cli::CacheCommand;
use tokensync_cli::Commands;
use tokensync_cli::OutputFormat;
use tokensync_cli::ScopeArg;
use tokensync_cli::TokenSyncCli;
use tokensync_core::BindingResolver;
use tokensync_core::BindingTarget;
use tokensync_core::BulkApplyOptions;
use tokensync_core::BulkMatcher;
use tokensync_core::ClientSettings;
use tokensync_core::CollectionReconciler;
use tokensync_core::CollectionSelector;
use tokensync_core::LibraryVariableCache;
use tokensync_core::MemoryBlobStore;
use tokensync_core::MemoryHost;
use tokensync_core::ProcessOutcome;
use tokensync_core::Settings;
use tokensync_core::SettingsStore;
use tokensync_core::SyncRequest;
use tokensync_core::TokenSyncConfig;
use tokensync_core::TokenSyncError;
use tokensync_core::apply_variable;
use tokensync_core::audit_bindings;
use tokensync_core::candidate_variables;
use tokensync_core::list_collections;
use tokensync_core::parse_query_responses;
use tokensync_core::rows_from_pages;
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Client storage location used when neither `--client` nor
/// `storage.client` is set.
const DEFAULT_CLIENT_PATH: &str = ".tokensync/client.json";

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,dimmed) => {
		if color_enabled() {
			format!("{}", $text.dimmed())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = TokenSyncCli::parse();

	// Respect NO_COLOR env var, --no-color flag, and terminals without color.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	let default_level = if args.verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.init();

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let Some(command) = &args.command else {
		eprintln!("No subcommand specified. Run `tokensync --help` for usage.");
		process::exit(1);
	};

	let result = match tokio::runtime::Runtime::new() {
		Ok(rt) => rt.block_on(run(&args, command)),
		Err(e) => Err(e.into()),
	};

	if let Err(e) = result {
		match e.downcast::<TokenSyncError>() {
			Ok(error) => {
				if args.format == OutputFormat::Json {
					if let Ok(json) = serde_json::to_string(&ProcessOutcome::failure(&error)) {
						println!("{json}");
					}
				}
				let report: miette::Report = (*error).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

async fn run(args: &TokenSyncCli, command: &Commands) -> CliResult<()> {
	let workspace = Workspace::open(args).await?;

	match command {
		Commands::Sync {
			source,
			collection,
			key_property,
			value_properties,
			save,
		} => {
			run_sync(
				args,
				&workspace,
				SyncFlags {
					source: source.as_deref(),
					collection: collection.as_deref(),
					key_property: key_property.as_deref(),
					value_properties,
					save: *save,
				},
			)
			.await?;
			workspace.write_document().await?;
		}
		Commands::Apply {
			scope,
			collection,
			no_components,
			instances,
			name_filter,
			variable,
			save,
		} => {
			let flags = ApplyFlags {
				scope: *scope,
				collection: collection.as_ref(),
				no_components: *no_components,
				instances: *instances,
				name_filter: name_filter.as_deref(),
			};
			run_apply(args, &workspace, &flags, variable.as_deref(), *save).await?;
			workspace.write_document().await?;
			workspace.write_client().await?;
		}
		Commands::Audit { scope } => run_audit(args, &workspace, *scope).await?,
		Commands::Collections => run_collections(args, &workspace).await?,
		Commands::Cache { action } => {
			run_cache(args, &workspace, action).await?;
			workspace.write_client().await?;
		}
	}

	Ok(())
}

/// The document snapshot and client storage a command works on, plus the
/// project config.
struct Workspace {
	root: PathBuf,
	config: TokenSyncConfig,
	document_path: Option<PathBuf>,
	client_path: PathBuf,
	host: MemoryHost,
	client: MemoryBlobStore,
}

impl Workspace {
	async fn open(args: &TokenSyncCli) -> CliResult<Self> {
		let root = resolve_root(args);
		let config = TokenSyncConfig::load(&root)?.unwrap_or_default();

		let document_path = args
			.document
			.clone()
			.or_else(|| config.storage.document.as_ref().map(|path| root.join(path)));
		let host = match &document_path {
			Some(path) => {
				let json = std::fs::read_to_string(path).map_err(|e| {
					format!("failed to read document snapshot {}: {e}", path.display())
				})?;
				debug!(path = %path.display(), "loaded document snapshot");
				MemoryHost::from_json(&json)?
			}
			None => MemoryHost::default(),
		};

		let client_path = args.client.clone().unwrap_or_else(|| {
			root.join(
				config
					.storage
					.client
					.clone()
					.unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_PATH)),
			)
		});
		let entries: BTreeMap<String, String> = if client_path.is_file() {
			serde_json::from_str(&std::fs::read_to_string(&client_path)?)?
		} else {
			BTreeMap::new()
		};
		let client =
			MemoryBlobStore::with_capacity(config.storage.client_capacity).with_entries(entries);

		let workspace = Self {
			root,
			config,
			document_path,
			client_path,
			host,
			client,
		};
		workspace.check_capacity().await;

		Ok(workspace)
	}

	async fn check_capacity(&self) {
		if let Some(limit) = self.client.capacity() {
			let used = self.client.used().await;
			if used > limit {
				eprintln!(
					"{} client storage holds {used} bytes, above its {limit} byte limit",
					colored!("warning:", yellow)
				);
			}
		}
	}

	fn require_document(&self) -> CliResult<&Path> {
		self.document_path.as_deref().ok_or_else(|| {
			"no document snapshot: pass `--document` or set `storage.document` in tokensync.toml"
				.into()
		})
	}

	fn settings(&self) -> SettingsStore<&MemoryHost, &MemoryBlobStore> {
		SettingsStore::new(&self.host, &self.client)
	}

	async fn write_document(&self) -> CliResult<()> {
		let path = self.require_document()?;
		std::fs::write(path, self.host.to_json().await?)?;
		debug!(path = %path.display(), "wrote document snapshot");
		Ok(())
	}

	async fn write_client(&self) -> CliResult<()> {
		if let Some(parent) = self.client_path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&self.client_path, self.client.to_json().await?)?;
		debug!(path = %self.client_path.display(), "wrote client storage");
		Ok(())
	}
}

fn resolve_root(args: &TokenSyncCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn print_json(value: &impl serde::Serialize) -> CliResult<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn print_success(
	args: &TokenSyncCli,
	outcome: &ProcessOutcome,
	details: &impl serde::Serialize,
) -> CliResult<()> {
	match args.format {
		OutputFormat::Json => {
			print_json(&serde_json::json!({
				"message": outcome.message,
				"error": outcome.error,
				"details": details,
			}))
		}
		OutputFormat::Text => {
			println!("{}", colored!(outcome.message, green));
			Ok(())
		}
	}
}

struct SyncFlags<'a> {
	source: Option<&'a Path>,
	collection: Option<&'a str>,
	key_property: Option<&'a str>,
	value_properties: &'a [String],
	save: bool,
}

async fn run_sync(
	args: &TokenSyncCli,
	workspace: &Workspace,
	flags: SyncFlags<'_>,
) -> CliResult<()> {
	workspace.require_document()?;

	let store = workspace.settings();
	let mut settings = store.load().await?;
	let mut document = settings.document.clone();
	workspace.config.sync.apply_to(&mut document);
	if let Some(name) = flags.collection {
		document.collection_name = name.to_string();
	}
	if let Some(key) = flags.key_property {
		document.key_property = key.to_string();
	}
	if !flags.value_properties.is_empty() {
		document.value_properties = flags.value_properties.to_vec();
	}

	let source = flags
		.source
		.map(Path::to_path_buf)
		.or_else(|| {
			workspace
				.config
				.sync
				.source
				.as_ref()
				.map(|path| workspace.root.join(path))
		})
		.ok_or("no source rows: pass `--source` or set `sync.source` in tokensync.toml")?;
	let json = std::fs::read_to_string(&source)
		.map_err(|e| TokenSyncError::FetchFailed(format!("{}: {e}", source.display())))?;
	let pages = parse_query_responses(&json)?;
	let rows = rows_from_pages(&pages, &document.key_property, &document.value_properties)?;

	let request = SyncRequest {
		collection_name: document.collection_name.clone(),
		rows,
		value_properties: document.value_properties.clone(),
	};
	let report = CollectionReconciler::new(&workspace.host)
		.reconcile(&request)
		.await?;

	if flags.save {
		settings.document = document;
		store.save(&settings).await?;
	}

	if args.format == OutputFormat::Text {
		for duplicate in &report.duplicates {
			eprintln!(
				"{} key `{}` of row {} is already taken, synced as `{}`",
				colored!("warning:", yellow),
				duplicate.key,
				duplicate.row_id,
				duplicate.renamed_to
			);
		}
	}

	print_success(args, &ProcessOutcome::success(report.to_string()), &report)?;
	if args.format == OutputFormat::Text {
		println!(
			"  {} {} ({} modes)",
			colored!("collection:", bold),
			report.collection.name,
			report.collection.modes.len()
		);
		println!("  created: {}", report.created.len());
		println!("  updated: {}", report.updated.len());
		println!("  removed: {}", report.removed.len());
	}

	Ok(())
}

struct ApplyFlags<'a> {
	scope: Option<ScopeArg>,
	collection: Option<&'a CollectionSelector>,
	no_components: bool,
	instances: bool,
	name_filter: Option<&'a str>,
}

/// Resolve bulk-apply options: flags, then config, then stored client
/// settings.
fn apply_options(
	settings: &Settings,
	config: &TokenSyncConfig,
	flags: &ApplyFlags<'_>,
) -> BulkApplyOptions {
	let mut options = settings.client.bulk_apply_options();
	config.apply.apply_to(&mut options);

	if let Some(scope) = flags.scope {
		options.scope = scope.into();
	}
	if let Some(collection) = flags.collection {
		options.collection = collection.clone();
	}
	if flags.no_components {
		options.filter.include_components = false;
	}
	if flags.instances {
		options.filter.include_instances = true;
	}
	if let Some(filter) = flags.name_filter {
		options.name_filter = Some(filter.to_string());
	}

	options
}

async fn run_apply(
	args: &TokenSyncCli,
	workspace: &Workspace,
	flags: &ApplyFlags<'_>,
	variable: Option<&str>,
	save: bool,
) -> CliResult<()> {
	workspace.require_document()?;

	let store = workspace.settings();
	let mut settings = store.load().await?;
	let options = apply_options(&settings, &workspace.config, flags);
	debug!(?options, "resolved bulk apply options");

	if save {
		settings.client = ClientSettings::from(&options);
		store.save(&settings).await?;
	}

	let cache = LibraryVariableCache::new(&workspace.client);

	if let Some(wanted) = variable {
		let candidates = candidate_variables(&workspace.host, &cache, &options.collection).await?;
		let chosen = candidates
			.iter()
			.find(|candidate| candidate.name == wanted || candidate.id.as_str() == wanted)
			.ok_or_else(|| TokenSyncError::VariableNotFound(wanted.to_string()))?;

		let resolver = BindingResolver::new(&workspace.host);
		let targets = apply_variable(&workspace.host, &resolver, chosen).await?;
		let message = format!("Applied `{}` to {} text elements.", chosen.name, targets.len());
		print_success(args, &ProcessOutcome::success(message), &targets)?;
		if args.format == OutputFormat::Text {
			for target in &targets {
				println!("  {}", describe_target(target));
			}
		}

		return Ok(());
	}

	let report = BulkMatcher::new(&workspace.host, &cache)
		.apply(&options)
		.await?;

	print_success(args, &ProcessOutcome::success(report.to_string()), &report)?;
	if args.format == OutputFormat::Text {
		for binding in &report.applied {
			println!(
				"  {} {} {}",
				binding.node,
				colored!("->", dimmed),
				binding.variable
			);
		}
		if args.verbose {
			println!("  unmatched: {}", report.unmatched);
			println!("  skipped: {}", report.skipped);
		}
	}

	Ok(())
}

fn describe_target(target: &BindingTarget) -> String {
	match target {
		BindingTarget::DirectText { node } => node.to_string(),
		BindingTarget::InstanceProperty { instance, property } => {
			format!("{instance} {}", colored!(format!("({property})"), dimmed))
		}
	}
}

async fn run_audit(
	args: &TokenSyncCli,
	workspace: &Workspace,
	scope: Option<ScopeArg>,
) -> CliResult<()> {
	workspace.require_document()?;

	let settings = workspace.settings().load().await?;
	let scope = match scope {
		Some(scope) => scope.into(),
		None => {
			workspace
				.config
				.apply
				.scope
				.unwrap_or(settings.client.target_scope)
		}
	};

	let resolver = BindingResolver::new(&workspace.host);
	let audit = audit_bindings(&workspace.host, &resolver, scope).await?;

	if args.format == OutputFormat::Json {
		return print_json(&audit);
	}

	for entry in &audit.entries {
		match &entry.variable {
			Some(name) => {
				println!(
					"{} {} {:?} {} {name}",
					colored!("bound  ", green),
					entry.node,
					entry.characters,
					colored!("->", dimmed)
				);
			}
			None => {
				println!(
					"{} {} {:?}",
					colored!("unbound", yellow),
					entry.node,
					entry.characters
				);
			}
		}
	}
	println!();
	println!("{}", colored!(audit.to_string(), bold));

	Ok(())
}

async fn run_collections(args: &TokenSyncCli, workspace: &Workspace) -> CliResult<()> {
	workspace.require_document()?;
	let listing = list_collections(&workspace.host).await?;

	if args.format == OutputFormat::Json {
		return print_json(&listing);
	}

	println!("{}", colored!("Local collections", bold));
	if listing.local.is_empty() {
		println!("  (none)");
	}
	for collection in &listing.local {
		println!(
			"  {} {} [{}]",
			collection.name,
			colored!(format!("local:{}", collection.id), dimmed),
			collection.mode_names().join(", ")
		);
	}

	println!();
	println!("{}", colored!("Library collections", bold));
	if listing.library.is_empty() {
		println!("  (none)");
	}
	for collection in &listing.library {
		println!(
			"  {} / {} {}",
			collection.library_name,
			collection.name,
			colored!(format!("library:{}", collection.key), dimmed)
		);
	}

	Ok(())
}

async fn run_cache(
	args: &TokenSyncCli,
	workspace: &Workspace,
	action: &CacheCommand,
) -> CliResult<()> {
	let cache = LibraryVariableCache::new(&workspace.client);

	match action {
		CacheCommand::Show => {
			let mut entries = BTreeMap::new();
			for key in cache.keys().await? {
				let count = cache.lookup(&key).await?.map_or(0, |variables| variables.len());
				entries.insert(key, count);
			}
			let used = workspace.client.used().await;

			if args.format == OutputFormat::Json {
				return print_json(&serde_json::json!({
					"entries": entries,
					"used": used,
					"capacity": workspace.client.capacity(),
				}));
			}

			if entries.is_empty() {
				println!("No library collections cached.");
			}
			for (key, count) in &entries {
				println!("  {key:<28} {count} variables");
			}
			if let Some(capacity) = workspace.client.capacity() {
				println!(
					"{}",
					colored!(format!("client storage: {used} / {capacity} bytes"), dimmed)
				);
			}
		}
		CacheCommand::Clear { key } => {
			let cached = cache.keys().await?;
			let keys: Vec<String> = match key {
				Some(key) => cached.into_iter().filter(|cached| cached == key).collect(),
				None => cached,
			};
			for key in &keys {
				cache.invalidate(key).await?;
			}

			let message = format!("Cleared {} library cache entries.", keys.len());
			print_success(args, &ProcessOutcome::success(message), &keys)?;
		}
	}

	Ok(())
}
