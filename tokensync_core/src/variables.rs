use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::BlobStore;
use crate::CachedVariable;
use crate::CollectionId;
use crate::CollectionSelector;
use crate::HostError;
use crate::HostResult;
use crate::LibraryCatalog;
use crate::LibraryCollection;
use crate::LibraryVariableCache;
use crate::ResolvedType;
use crate::TokenSyncResult;
use crate::Variable;
use crate::VariableCollection;
use crate::VariableStore;

/// Local collections and available library collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionListing {
	pub local: Vec<VariableCollection>,
	pub library: Vec<LibraryCollection>,
}

pub async fn list_collections<H>(host: &H) -> TokenSyncResult<CollectionListing>
where
	H: VariableStore + LibraryCatalog,
{
	let local = host.local_collections().await?;
	let library = host.library_collections().await?;
	debug!(
		local = local.len(),
		library = library.len(),
		"listed collections"
	);

	Ok(CollectionListing { local, library })
}

/// String variables of one local collection. An unknown collection id yields
/// no variables.
pub async fn local_string_variables<S: VariableStore>(
	store: &S,
	collection: &CollectionId,
) -> TokenSyncResult<Vec<CachedVariable>> {
	let collections = store.local_collections().await?;
	if !collections.iter().any(|candidate| &candidate.id == collection) {
		debug!(%collection, "collection is not a local collection");
		return Ok(Vec::new());
	}

	let variables = store.local_variables(ResolvedType::String).await?;
	Ok(variables
		.into_iter()
		.filter(|variable| &variable.collection_id == collection)
		.map(CachedVariable::from)
		.collect())
}

/// String variables of one library collection, served from the cache when
/// possible.
pub async fn library_string_variables<C, B>(
	catalog: &C,
	cache: &LibraryVariableCache<B>,
	collection_key: &str,
) -> TokenSyncResult<Vec<CachedVariable>>
where
	C: LibraryCatalog,
	B: BlobStore,
{
	let fetched = cache.fetch(catalog, collection_key).await?;
	if let Some(error) = &fetched.cache_result.error {
		warn!(collection_key, %error, "library variables were not persisted");
	}

	Ok(fetched
		.variables
		.into_iter()
		.filter(|variable| variable.resolved_type == ResolvedType::String)
		.collect())
}

/// Build the set of variables bulk matching may bind, in a stable order:
/// local collections in host order, then library collections in host order.
pub async fn candidate_variables<H, B>(
	host: &H,
	cache: &LibraryVariableCache<B>,
	selector: &CollectionSelector,
) -> TokenSyncResult<Vec<CachedVariable>>
where
	H: VariableStore + LibraryCatalog,
	B: BlobStore,
{
	match selector {
		CollectionSelector::All => {
			let collections = host.local_collections().await?;
			let locals = host.local_variables(ResolvedType::String).await?;
			let mut candidates = Vec::new();

			for collection in &collections {
				candidates.extend(
					locals
						.iter()
						.filter(|variable| variable.collection_id == collection.id)
						.map(CachedVariable::from),
				);
			}

			// Sequential on purpose: every cache write rewrites the shared blob.
			for library in host.library_collections().await? {
				candidates.extend(library_string_variables(host, cache, &library.key).await?);
			}

			Ok(candidates)
		}
		CollectionSelector::Local(collection) => local_string_variables(host, collection).await,
		CollectionSelector::Library(key) => library_string_variables(host, cache, key).await,
	}
}

/// Find the live variable behind a candidate: by id first, then by importing
/// its key. Returns `None` when neither exists any more.
pub async fn resolve_live_variable<H>(
	host: &H,
	candidate: &CachedVariable,
) -> HostResult<Option<Variable>>
where
	H: VariableStore + LibraryCatalog,
{
	if let Some(variable) = host.variable_by_id(&candidate.id).await? {
		return Ok(Some(variable));
	}

	match host.import_variable_by_key(&candidate.key).await {
		Ok(variable) => {
			debug!(key = %candidate.key, "imported variable by key");
			Ok(Some(variable))
		}
		Err(HostError::NotFound(_)) => Ok(None),
		Err(error) => Err(error),
	}
}
