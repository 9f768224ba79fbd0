use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::BlobStore;
use crate::BulkApplyOptions;
use crate::CollectionSelector;
use crate::NodeFilter;
use crate::TextScope;
use crate::TokenSyncResult;

/// Key settings are stored under, in both the document and the client store.
pub const SETTINGS_KEY: &str = "tokensync-settings";

/// Settings shared by everyone working on a document: how to reach the
/// external source and which collection it syncs into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentSettings {
	pub database_id: String,
	pub integration_token: String,
	pub key_property: String,
	pub value_properties: Vec<String>,
	pub collection_name: String,
}

/// Per-user preferences for bulk apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
	pub target_collection: CollectionSelector,
	pub target_scope: TextScope,
	pub include_components: bool,
	pub include_instances: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name_filter: Option<String>,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self::from(&BulkApplyOptions::default())
	}
}

impl ClientSettings {
	pub fn bulk_apply_options(&self) -> BulkApplyOptions {
		BulkApplyOptions {
			scope: self.target_scope,
			collection: self.target_collection.clone(),
			filter: NodeFilter {
				include_components: self.include_components,
				include_instances: self.include_instances,
			},
			name_filter: self.name_filter.clone(),
		}
	}
}

impl From<&BulkApplyOptions> for ClientSettings {
	fn from(options: &BulkApplyOptions) -> Self {
		Self {
			target_collection: options.collection.clone(),
			target_scope: options.scope,
			include_components: options.filter.include_components,
			include_instances: options.filter.include_instances,
			name_filter: options.name_filter.clone(),
		}
	}
}

/// Document and client settings merged into one view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
	#[serde(flatten)]
	pub document: DocumentSettings,
	#[serde(flatten)]
	pub client: ClientSettings,
}

/// Reads and writes [`Settings`] split across the two stores.
#[derive(Debug)]
pub struct SettingsStore<D, C> {
	document: D,
	client: C,
}

impl<D: BlobStore, C: BlobStore> SettingsStore<D, C> {
	pub fn new(document: D, client: C) -> Self {
		Self { document, client }
	}

	/// Load both halves, using defaults for whatever was never saved.
	pub async fn load(&self) -> TokenSyncResult<Settings> {
		let document = match self.document.load(SETTINGS_KEY).await? {
			Some(raw) => serde_json::from_str(&raw)?,
			None => DocumentSettings::default(),
		};
		let client = match self.client.load(SETTINGS_KEY).await? {
			Some(raw) => serde_json::from_str(&raw)?,
			None => ClientSettings::default(),
		};
		debug!("loaded settings");

		Ok(Settings { document, client })
	}

	pub async fn save(&self, settings: &Settings) -> TokenSyncResult<()> {
		self.document
			.save(SETTINGS_KEY, serde_json::to_string(&settings.document)?)
			.await?;
		self.client
			.save(SETTINGS_KEY, serde_json::to_string(&settings.client)?)
			.await?;
		debug!("saved settings");

		Ok(())
	}
}
