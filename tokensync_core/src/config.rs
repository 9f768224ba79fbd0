use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::BulkApplyOptions;
use crate::CollectionSelector;
use crate::DocumentSettings;
use crate::TextScope;
use crate::TokenSyncError;
use crate::TokenSyncResult;

/// Default client storage ceiling in bytes (5 MB).
pub const DEFAULT_CLIENT_CAPACITY: usize = 5 * 1024 * 1024;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = [
	"tokensync.toml",
	".tokensync.toml",
	".config/tokensync.toml",
];

/// Configuration loaded from a `tokensync.toml` file.
///
/// ```toml
/// [sync]
/// source = "messages.json"
/// collection_name = "Messages"
/// key_property = "key"
/// value_properties = ["ja", "en"]
///
/// [apply]
/// scope = "current-page"
/// collection = "all"
/// include_components = true
/// include_instances = false
/// name_filter = "button/"
///
/// [storage]
/// document = "design.json"
/// client = ".tokensync/client.json"
/// client_capacity = 5242880
/// ```
///
/// Every value is optional. Values set here take precedence over settings
/// stored in the document or client store.
#[derive(Debug, Default, Deserialize)]
pub struct TokenSyncConfig {
	#[serde(default)]
	pub sync: SyncConfig,
	#[serde(default)]
	pub apply: ApplyConfig,
	#[serde(default)]
	pub storage: StorageConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncConfig {
	/// Path to a saved query response of the external database, relative to
	/// the project root.
	#[serde(default)]
	pub source: Option<PathBuf>,
	#[serde(default)]
	pub collection_name: Option<String>,
	#[serde(default)]
	pub key_property: Option<String>,
	/// Mode names in display order.
	#[serde(default)]
	pub value_properties: Option<Vec<String>>,
}

impl SyncConfig {
	/// Overlay the configured values onto stored document settings.
	pub fn apply_to(&self, settings: &mut DocumentSettings) {
		if let Some(name) = &self.collection_name {
			settings.collection_name.clone_from(name);
		}
		if let Some(key) = &self.key_property {
			settings.key_property.clone_from(key);
		}
		if let Some(values) = &self.value_properties {
			settings.value_properties.clone_from(values);
		}
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyConfig {
	#[serde(default)]
	pub scope: Option<TextScope>,
	#[serde(default)]
	pub collection: Option<CollectionSelector>,
	#[serde(default)]
	pub include_components: Option<bool>,
	#[serde(default)]
	pub include_instances: Option<bool>,
	#[serde(default)]
	pub name_filter: Option<String>,
}

impl ApplyConfig {
	/// Overlay the configured values onto bulk-apply options.
	pub fn apply_to(&self, options: &mut BulkApplyOptions) {
		if let Some(scope) = self.scope {
			options.scope = scope;
		}
		if let Some(collection) = &self.collection {
			options.collection = collection.clone();
		}
		if let Some(include) = self.include_components {
			options.filter.include_components = include;
		}
		if let Some(include) = self.include_instances {
			options.filter.include_instances = include;
		}
		if let Some(filter) = &self.name_filter {
			options.name_filter = Some(filter.clone());
		}
	}
}

/// Where the document snapshot and client storage live.
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
	#[serde(default)]
	pub document: Option<PathBuf>,
	#[serde(default)]
	pub client: Option<PathBuf>,
	/// Capacity of the client store in bytes.
	#[serde(default = "default_client_capacity")]
	pub client_capacity: usize,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			document: None,
			client: None,
			client_capacity: DEFAULT_CLIENT_CAPACITY,
		}
	}
}

fn default_client_capacity() -> usize {
	DEFAULT_CLIENT_CAPACITY
}

impl TokenSyncConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> TokenSyncResult<Option<TokenSyncConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config: TokenSyncConfig =
			toml::from_str(&content).map_err(|e| TokenSyncError::ConfigParse(e.to_string()))?;

		Ok(Some(config))
	}
}
