use std::collections::BTreeMap;

use futures::future::try_join_all;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::BlobStore;
use crate::CachedVariable;
use crate::LibraryCatalog;
use crate::TokenSyncResult;

pub(crate) const CACHE_SCHEMA_VERSION: u32 = 1;

/// Client-storage key the cache blob is written under.
pub const CACHE_KEY: &str = "tokensync-cache";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CacheBlob {
	pub schema_version: u32,
	#[serde(default)]
	pub collections: BTreeMap<String, Vec<CachedVariable>>,
}

impl CacheBlob {
	fn new() -> Self {
		Self {
			schema_version: CACHE_SCHEMA_VERSION,
			collections: BTreeMap::new(),
		}
	}
}

/// Outcome of persisting a cache entry. A failed write never fails the
/// operation that produced the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheWriteResult {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl CacheWriteResult {
	pub fn ok() -> Self {
		Self {
			success: true,
			error: None,
		}
	}

	pub fn failed(error: impl ToString) -> Self {
		Self {
			success: false,
			error: Some(error.to_string()),
		}
	}
}

/// Where the variables of a [`LibraryFetch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
	Hit,
	Fetched,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryFetch {
	pub variables: Vec<CachedVariable>,
	pub cache_result: CacheWriteResult,
	pub source: CacheSource,
}

/// Reduced snapshots of imported library collections, keyed by library
/// collection key.
///
/// Entries live in memory for the life of the object and are mirrored into
/// client storage so later sessions skip the import. When the mirror write
/// fails the entry stays in memory only.
#[derive(Debug)]
pub struct LibraryVariableCache<B> {
	store: B,
	entries: Mutex<BTreeMap<String, Vec<CachedVariable>>>,
}

impl<B: BlobStore> LibraryVariableCache<B> {
	pub fn new(store: B) -> Self {
		Self {
			store,
			entries: Mutex::new(BTreeMap::new()),
		}
	}

	pub fn store(&self) -> &B {
		&self.store
	}

	/// Cached variables for `key`, or `None` on a miss.
	pub async fn lookup(&self, key: &str) -> TokenSyncResult<Option<Vec<CachedVariable>>> {
		let mut entries = self.entries.lock().await;
		if let Some(variables) = entries.get(key) {
			debug!(key, "library cache hit (memory)");
			return Ok(Some(variables.clone()));
		}

		let mut blob = self.load_blob().await?;
		let Some(variables) = blob.collections.remove(key) else {
			debug!(key, "library cache miss");
			return Ok(None);
		};

		debug!(key, "library cache hit (storage)");
		entries.insert(key.to_string(), variables.clone());
		Ok(Some(variables))
	}

	/// Replace the entry for `key` and mirror it into storage.
	pub async fn save(&self, key: &str, variables: &[CachedVariable]) -> CacheWriteResult {
		let mut entries = self.entries.lock().await;
		entries.insert(key.to_string(), variables.to_vec());

		let result = self.persist_entry(key, variables).await;
		match &result.error {
			None => debug!(key, count = variables.len(), "saved library cache entry"),
			Some(error) => warn!(key, %error, "library cache entry kept in memory only"),
		}

		result
	}

	/// Drop the entry for `key`. Unknown keys are ignored.
	pub async fn invalidate(&self, key: &str) -> TokenSyncResult<()> {
		let mut entries = self.entries.lock().await;
		entries.remove(key);

		let mut blob = self.load_blob().await?;
		if blob.collections.remove(key).is_none() {
			debug!(key, "nothing cached under key");
			return Ok(());
		}

		if blob.collections.is_empty() {
			self.store.remove(CACHE_KEY).await?;
		} else {
			self.store
				.save(CACHE_KEY, serde_json::to_string(&blob)?)
				.await?;
		}

		info!(key, "invalidated library cache entry");
		Ok(())
	}

	/// Every key with an entry, in memory or in storage.
	pub async fn keys(&self) -> TokenSyncResult<Vec<String>> {
		let entries = self.entries.lock().await;
		let blob = self.load_blob().await?;
		let mut keys: Vec<String> = entries
			.keys()
			.chain(blob.collections.keys())
			.cloned()
			.collect();
		keys.sort();
		keys.dedup();

		Ok(keys)
	}

	/// Variables of a library collection, importing them on a miss.
	///
	/// The returned [`CacheWriteResult`] only describes the storage write; the
	/// variables are returned even when it failed.
	pub async fn fetch<C: LibraryCatalog>(
		&self,
		catalog: &C,
		key: &str,
	) -> TokenSyncResult<LibraryFetch> {
		if let Some(variables) = self.lookup(key).await? {
			return Ok(LibraryFetch {
				variables,
				cache_result: CacheWriteResult::ok(),
				source: CacheSource::Hit,
			});
		}

		info!(key, "importing library collection");
		let published = catalog.library_variables(key).await?;
		let imports = published
			.iter()
			.map(|variable| catalog.import_variable_by_key(&variable.key));
		let variables: Vec<CachedVariable> = try_join_all(imports)
			.await?
			.into_iter()
			.map(CachedVariable::from)
			.collect();

		let cache_result = self.save(key, &variables).await;

		Ok(LibraryFetch {
			variables,
			cache_result,
			source: CacheSource::Fetched,
		})
	}

	async fn persist_entry(&self, key: &str, variables: &[CachedVariable]) -> CacheWriteResult {
		let mut blob = match self.load_blob().await {
			Ok(blob) => blob,
			Err(error) => return CacheWriteResult::failed(error),
		};
		blob.collections.insert(key.to_string(), variables.to_vec());

		let payload = match serde_json::to_string(&blob) {
			Ok(payload) => payload,
			Err(error) => return CacheWriteResult::failed(error),
		};

		match self.store.save(CACHE_KEY, payload).await {
			Ok(()) => CacheWriteResult::ok(),
			Err(error) => CacheWriteResult::failed(error),
		}
	}

	/// Read the persisted blob. Unreadable or outdated blobs count as empty.
	async fn load_blob(&self) -> TokenSyncResult<CacheBlob> {
		let Some(raw) = self.store.load(CACHE_KEY).await? else {
			return Ok(CacheBlob::new());
		};

		let blob: CacheBlob = match serde_json::from_str(&raw) {
			Ok(blob) => blob,
			Err(error) => {
				warn!(%error, "ignoring unreadable library cache");
				return Ok(CacheBlob::new());
			}
		};

		if blob.schema_version != CACHE_SCHEMA_VERSION {
			debug!(
				found = blob.schema_version,
				expected = CACHE_SCHEMA_VERSION,
				"ignoring library cache with another schema version"
			);
			return Ok(CacheBlob::new());
		}

		Ok(blob)
	}
}
