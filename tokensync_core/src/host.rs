//! Interfaces the core consumes from the design tool.
//!
//! Every method is asynchronous because the host answers over a message
//! channel and the document may change between two calls. Lookups return
//! `Ok(None)` for nodes or variables that no longer exist; mutating calls on
//! something that vanished return [`HostError::NotFound`].

use crate::CollectionId;
use crate::HostResult;
use crate::LibraryCollection;
use crate::LibraryVariable;
use crate::ModeId;
use crate::NodeId;
use crate::ResolvedType;
use crate::SceneNode;
use crate::TextNode;
use crate::Variable;
use crate::VariableAlias;
use crate::VariableCollection;
use crate::VariableId;
use crate::VariableScope;
use crate::VariableValue;

/// The document's local variables and collections.
#[allow(async_fn_in_trait)]
pub trait VariableStore {
	async fn local_collections(&self) -> HostResult<Vec<VariableCollection>>;

	async fn collection_by_id(&self, id: &CollectionId) -> HostResult<Option<VariableCollection>>;

	/// Create a collection with a single default mode.
	async fn create_collection(&self, name: &str) -> HostResult<VariableCollection>;

	async fn rename_mode(&self, collection: &CollectionId, mode: &ModeId, name: &str)
	-> HostResult<()>;

	async fn add_mode(&self, collection: &CollectionId, name: &str) -> HostResult<ModeId>;

	/// Remove a mode. The host rejects removal of the default mode.
	async fn remove_mode(&self, collection: &CollectionId, mode: &ModeId) -> HostResult<()>;

	async fn local_variables(&self, resolved_type: ResolvedType) -> HostResult<Vec<Variable>>;

	/// Look up a local or already imported variable.
	async fn variable_by_id(&self, id: &VariableId) -> HostResult<Option<Variable>>;

	async fn create_variable(
		&self,
		name: &str,
		collection: &CollectionId,
		resolved_type: ResolvedType,
	) -> HostResult<Variable>;

	async fn remove_variable(&self, id: &VariableId) -> HostResult<()>;

	async fn set_scopes(&self, id: &VariableId, scopes: &[VariableScope]) -> HostResult<()>;

	/// Set (or with `None`, clear) the value of one mode.
	async fn set_value_for_mode(
		&self,
		id: &VariableId,
		mode: &ModeId,
		value: Option<VariableValue>,
	) -> HostResult<()>;
}

/// Variable collections published from other files.
#[allow(async_fn_in_trait)]
pub trait LibraryCatalog {
	async fn library_collections(&self) -> HostResult<Vec<LibraryCollection>>;

	async fn library_variables(&self, collection_key: &str) -> HostResult<Vec<LibraryVariable>>;

	/// Import a published variable into the document by its key. Slow: the
	/// host fetches the whole variable from the library.
	async fn import_variable_by_key(&self, key: &str) -> HostResult<Variable>;
}

/// The live document tree.
#[allow(async_fn_in_trait)]
pub trait SceneGraph {
	async fn selection(&self) -> HostResult<Vec<SceneNode>>;

	async fn current_page(&self) -> HostResult<SceneNode>;

	async fn pages(&self) -> HostResult<Vec<SceneNode>>;

	/// Make sure the page's contents are available before traversing it.
	async fn load_page(&self, page: &NodeId) -> HostResult<()>;

	async fn node_by_id(&self, id: &NodeId) -> HostResult<Option<SceneNode>>;

	/// The structural parent. `None` for the document root.
	async fn parent(&self, id: &NodeId) -> HostResult<Option<SceneNode>>;

	async fn text_node(&self, id: &NodeId) -> HostResult<Option<TextNode>>;

	/// Every text node below `root`, in document order.
	async fn text_descendants(&self, root: &NodeId) -> HostResult<Vec<TextNode>>;

	/// Bind a variable to a text node's content.
	async fn bind_characters(&self, node: &NodeId, variable: &VariableId) -> HostResult<()>;

	/// Override an instance property with a variable alias.
	async fn set_instance_property(
		&self,
		instance: &NodeId,
		property: &str,
		alias: VariableAlias,
	) -> HostResult<()>;

	async fn instance_property_binding(
		&self,
		instance: &NodeId,
		property: &str,
	) -> HostResult<Option<VariableAlias>>;
}

/// Key/value blob persistence. The host provides a document-scoped store
/// and a client-scoped store; the latter has a capacity ceiling.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
	async fn load(&self, key: &str) -> HostResult<Option<String>>;

	async fn save(&self, key: &str, blob: String) -> HostResult<()>;

	async fn remove(&self, key: &str) -> HostResult<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
	async fn load(&self, key: &str) -> HostResult<Option<String>> {
		(**self).load(key).await
	}

	async fn save(&self, key: &str, blob: String) -> HostResult<()> {
		(**self).save(key, blob).await
	}

	async fn remove(&self, key: &str) -> HostResult<()> {
		(**self).remove(key).await
	}
}
