//! In-process host backed by a serializable document snapshot.
//!
//! [`MemoryHost`] implements every host interface over a [`DocumentSnapshot`]
//! so the core can run outside the design tool, against a JSON file on disk
//! or a document built in a test. [`MemoryBlobStore`] plays the client-scoped
//! store, including its capacity ceiling.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::trace;

use crate::BlobStore;
use crate::CollectionId;
use crate::ComponentPropertyReferences;
use crate::HostError;
use crate::HostResult;
use crate::LibraryCatalog;
use crate::LibraryCollection;
use crate::LibraryVariable;
use crate::Mode;
use crate::ModeId;
use crate::NodeId;
use crate::NodeKind;
use crate::ResolvedType;
use crate::SceneGraph;
use crate::SceneNode;
use crate::TextNode;
use crate::TokenSyncResult;
use crate::Variable;
use crate::VariableAlias;
use crate::VariableCollection;
use crate::VariableId;
use crate::VariableScope;
use crate::VariableStore;
use crate::VariableValue;

/// An overridable property of a component instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceProperty {
	#[serde(default)]
	pub value: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bound_variable: Option<VariableAlias>,
}

/// A node of the snapshot tree. The tree is stored flat with parent links,
/// in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
	pub id: NodeId,
	#[serde(rename = "type")]
	pub kind: NodeKind,
	#[serde(default)]
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent: Option<NodeId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub characters: Option<String>,
	#[serde(default)]
	pub component_property_references: ComponentPropertyReferences,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bound_characters: Option<VariableAlias>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub component_properties: BTreeMap<String, InstanceProperty>,
}

impl SnapshotNode {
	pub fn new(id: impl Into<NodeId>, kind: NodeKind, parent: Option<&NodeId>) -> Self {
		Self {
			id: id.into(),
			kind,
			name: String::new(),
			parent: parent.cloned(),
			characters: None,
			component_property_references: ComponentPropertyReferences::default(),
			bound_characters: None,
			component_properties: BTreeMap::new(),
		}
	}

	fn scene_node(&self) -> SceneNode {
		SceneNode {
			id: self.id.clone(),
			kind: self.kind.clone(),
			name: self.name.clone(),
		}
	}

	fn text_node(&self) -> Option<TextNode> {
		if self.kind != NodeKind::Text {
			return None;
		}

		Some(TextNode {
			id: self.id.clone(),
			characters: self.characters.clone().unwrap_or_default(),
			component_property_references: self.component_property_references.clone(),
			bound_characters: self.bound_characters.clone(),
		})
	}
}

/// A library published from another file, with the full variables an
/// import would bring in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySnapshot {
	#[serde(flatten)]
	pub collection: LibraryCollection,
	#[serde(default)]
	pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
	#[serde(default)]
	pub nodes: Vec<SnapshotNode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub current_page: Option<NodeId>,
	#[serde(default)]
	pub selection: Vec<NodeId>,
	#[serde(default)]
	pub collections: Vec<VariableCollection>,
	/// Local variables plus every imported library variable.
	#[serde(default)]
	pub variables: Vec<Variable>,
	#[serde(default)]
	pub libraries: Vec<LibrarySnapshot>,
	/// Document-scoped key/value data.
	#[serde(default)]
	pub plugin_data: BTreeMap<String, String>,
	/// Counter used to mint ids for created collections, modes, and
	/// variables.
	#[serde(default)]
	pub next_id: u64,
}

impl DocumentSnapshot {
	fn mint(&mut self, prefix: &str) -> String {
		self.next_id += 1;
		format!("{prefix}:{}", self.next_id)
	}

	fn node(&self, id: &NodeId) -> Option<&SnapshotNode> {
		self.nodes.iter().find(|node| &node.id == id)
	}

	fn node_mut(&mut self, id: &NodeId) -> HostResult<&mut SnapshotNode> {
		self.nodes
			.iter_mut()
			.find(|node| &node.id == id)
			.ok_or_else(|| HostError::NotFound(id.to_string()))
	}

	fn collection_mut(&mut self, id: &CollectionId) -> HostResult<&mut VariableCollection> {
		self.collections
			.iter_mut()
			.find(|collection| &collection.id == id)
			.ok_or_else(|| HostError::NotFound(id.to_string()))
	}

	fn variable_mut(&mut self, id: &VariableId) -> HostResult<&mut Variable> {
		self.variables
			.iter_mut()
			.find(|variable| &variable.id == id)
			.ok_or_else(|| HostError::NotFound(id.to_string()))
	}

	fn is_descendant(&self, node: &SnapshotNode, root: &NodeId) -> bool {
		let mut parent = node.parent.as_ref();
		while let Some(id) = parent {
			if id == root {
				return true;
			}
			parent = self.node(id).and_then(|node| node.parent.as_ref());
		}

		false
	}
}

/// A host that keeps the whole document in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
	state: RwLock<DocumentSnapshot>,
}

impl MemoryHost {
	pub fn new(snapshot: DocumentSnapshot) -> Self {
		Self {
			state: RwLock::new(snapshot),
		}
	}

	pub fn from_json(json: &str) -> TokenSyncResult<Self> {
		Ok(Self::new(serde_json::from_str(json)?))
	}

	pub async fn to_json(&self) -> TokenSyncResult<String> {
		let state = self.state.read().await;
		Ok(serde_json::to_string_pretty(&*state)?)
	}

	/// A copy of the current document state.
	pub async fn snapshot(&self) -> DocumentSnapshot {
		self.state.read().await.clone()
	}

	pub fn into_snapshot(self) -> DocumentSnapshot {
		self.state.into_inner()
	}
}

impl VariableStore for MemoryHost {
	async fn local_collections(&self) -> HostResult<Vec<VariableCollection>> {
		Ok(self.state.read().await.collections.clone())
	}

	async fn collection_by_id(&self, id: &CollectionId) -> HostResult<Option<VariableCollection>> {
		let state = self.state.read().await;
		Ok(state
			.collections
			.iter()
			.find(|collection| &collection.id == id)
			.cloned())
	}

	async fn create_collection(&self, name: &str) -> HostResult<VariableCollection> {
		let mut state = self.state.write().await;
		let id = CollectionId::new(state.mint("VariableCollectionId"));
		let mode_id = ModeId::new(state.mint("Mode"));
		let collection = VariableCollection {
			id,
			name: name.to_string(),
			modes: vec![Mode {
				mode_id: mode_id.clone(),
				name: "Mode 1".to_string(),
			}],
			default_mode_id: mode_id,
		};
		state.collections.push(collection.clone());
		trace!(collection = %collection.id, "created collection");

		Ok(collection)
	}

	async fn rename_mode(
		&self,
		collection: &CollectionId,
		mode: &ModeId,
		name: &str,
	) -> HostResult<()> {
		let mut state = self.state.write().await;
		let collection = state.collection_mut(collection)?;
		let mode = collection
			.modes
			.iter_mut()
			.find(|candidate| &candidate.mode_id == mode)
			.ok_or_else(|| HostError::NotFound(mode.to_string()))?;
		mode.name = name.to_string();

		Ok(())
	}

	async fn add_mode(&self, collection: &CollectionId, name: &str) -> HostResult<ModeId> {
		let mut state = self.state.write().await;
		let mode_id = ModeId::new(state.mint("Mode"));
		let collection = state.collection_mut(collection)?;
		collection.modes.push(Mode {
			mode_id: mode_id.clone(),
			name: name.to_string(),
		});

		Ok(mode_id)
	}

	async fn remove_mode(&self, collection: &CollectionId, mode: &ModeId) -> HostResult<()> {
		let mut state = self.state.write().await;
		let target = state.collection_mut(collection)?;
		if &target.default_mode_id == mode {
			return Err(HostError::Rejected(format!(
				"cannot remove default mode `{mode}`"
			)));
		}

		let before = target.modes.len();
		target.modes.retain(|candidate| &candidate.mode_id != mode);
		if target.modes.len() == before {
			return Err(HostError::NotFound(mode.to_string()));
		}

		for variable in &mut state.variables {
			if &variable.collection_id == collection {
				variable.values_by_mode.remove(mode);
			}
		}

		Ok(())
	}

	async fn local_variables(&self, resolved_type: ResolvedType) -> HostResult<Vec<Variable>> {
		let state = self.state.read().await;
		Ok(state
			.variables
			.iter()
			.filter(|variable| !variable.remote && variable.resolved_type == resolved_type)
			.cloned()
			.collect())
	}

	async fn variable_by_id(&self, id: &VariableId) -> HostResult<Option<Variable>> {
		let state = self.state.read().await;
		Ok(state
			.variables
			.iter()
			.find(|variable| &variable.id == id)
			.cloned())
	}

	async fn create_variable(
		&self,
		name: &str,
		collection: &CollectionId,
		resolved_type: ResolvedType,
	) -> HostResult<Variable> {
		let mut state = self.state.write().await;
		if !state
			.collections
			.iter()
			.any(|candidate| &candidate.id == collection)
		{
			return Err(HostError::NotFound(collection.to_string()));
		}

		if state
			.variables
			.iter()
			.any(|variable| &variable.collection_id == collection && variable.name == name)
		{
			return Err(HostError::Rejected(format!(
				"a variable named `{name}` already exists in `{collection}`"
			)));
		}

		let id = VariableId::new(state.mint("VariableID"));
		let key = format!("{:x}", state.next_id);
		let variable = Variable {
			id,
			key,
			name: name.to_string(),
			collection_id: collection.clone(),
			resolved_type,
			values_by_mode: BTreeMap::new(),
			scopes: vec![VariableScope::AllScopes],
			description: String::new(),
			remote: false,
			hidden_from_publishing: false,
		};
		state.variables.push(variable.clone());

		Ok(variable)
	}

	async fn remove_variable(&self, id: &VariableId) -> HostResult<()> {
		let mut state = self.state.write().await;
		let before = state.variables.len();
		state.variables.retain(|variable| &variable.id != id);
		if state.variables.len() == before {
			return Err(HostError::NotFound(id.to_string()));
		}

		Ok(())
	}

	async fn set_scopes(&self, id: &VariableId, scopes: &[VariableScope]) -> HostResult<()> {
		let mut state = self.state.write().await;
		state.variable_mut(id)?.scopes = scopes.to_vec();

		Ok(())
	}

	async fn set_value_for_mode(
		&self,
		id: &VariableId,
		mode: &ModeId,
		value: Option<VariableValue>,
	) -> HostResult<()> {
		let mut state = self.state.write().await;
		let collection_id = state.variable_mut(id)?.collection_id.clone();
		let has_mode = state
			.collections
			.iter()
			.find(|collection| collection.id == collection_id)
			.is_some_and(|collection| collection.modes.iter().any(|m| &m.mode_id == mode));
		if !has_mode {
			return Err(HostError::NotFound(mode.to_string()));
		}

		let variable = state.variable_mut(id)?;
		match value {
			Some(value) => {
				variable.values_by_mode.insert(mode.clone(), value);
			}
			None => {
				variable.values_by_mode.remove(mode);
			}
		}

		Ok(())
	}
}

impl LibraryCatalog for MemoryHost {
	async fn library_collections(&self) -> HostResult<Vec<LibraryCollection>> {
		let state = self.state.read().await;
		Ok(state
			.libraries
			.iter()
			.map(|library| library.collection.clone())
			.collect())
	}

	async fn library_variables(&self, collection_key: &str) -> HostResult<Vec<LibraryVariable>> {
		let state = self.state.read().await;
		let library = state
			.libraries
			.iter()
			.find(|library| library.collection.key == collection_key)
			.ok_or_else(|| HostError::NotFound(collection_key.to_string()))?;

		Ok(library
			.variables
			.iter()
			.map(|variable| {
				LibraryVariable {
					key: variable.key.clone(),
					name: variable.name.clone(),
					resolved_type: variable.resolved_type,
				}
			})
			.collect())
	}

	async fn import_variable_by_key(&self, key: &str) -> HostResult<Variable> {
		let mut state = self.state.write().await;
		if let Some(imported) = state
			.variables
			.iter()
			.find(|variable| variable.remote && variable.key == key)
		{
			return Ok(imported.clone());
		}

		let published = state
			.libraries
			.iter()
			.flat_map(|library| library.variables.iter())
			.find(|variable| variable.key == key)
			.cloned()
			.ok_or_else(|| HostError::NotFound(key.to_string()))?;

		let imported = Variable {
			remote: true,
			..published
		};
		state.variables.push(imported.clone());
		trace!(key, variable = %imported.id, "imported library variable");

		Ok(imported)
	}
}

impl SceneGraph for MemoryHost {
	async fn selection(&self) -> HostResult<Vec<SceneNode>> {
		let state = self.state.read().await;
		Ok(state
			.selection
			.iter()
			.filter_map(|id| state.node(id))
			.map(SnapshotNode::scene_node)
			.collect())
	}

	async fn current_page(&self) -> HostResult<SceneNode> {
		let state = self.state.read().await;
		let page = match &state.current_page {
			Some(id) => state.node(id),
			None => state.nodes.iter().find(|node| node.kind == NodeKind::Page),
		};

		page.map(SnapshotNode::scene_node)
			.ok_or_else(|| HostError::NotFound("current page".to_string()))
	}

	async fn pages(&self) -> HostResult<Vec<SceneNode>> {
		let state = self.state.read().await;
		Ok(state
			.nodes
			.iter()
			.filter(|node| node.kind == NodeKind::Page)
			.map(SnapshotNode::scene_node)
			.collect())
	}

	async fn load_page(&self, page: &NodeId) -> HostResult<()> {
		let state = self.state.read().await;
		match state.node(page) {
			Some(node) if node.kind == NodeKind::Page => Ok(()),
			_ => Err(HostError::NotFound(page.to_string())),
		}
	}

	async fn node_by_id(&self, id: &NodeId) -> HostResult<Option<SceneNode>> {
		let state = self.state.read().await;
		Ok(state.node(id).map(SnapshotNode::scene_node))
	}

	async fn parent(&self, id: &NodeId) -> HostResult<Option<SceneNode>> {
		let state = self.state.read().await;
		Ok(state
			.node(id)
			.and_then(|node| node.parent.as_ref())
			.and_then(|parent| state.node(parent))
			.map(SnapshotNode::scene_node))
	}

	async fn text_node(&self, id: &NodeId) -> HostResult<Option<TextNode>> {
		let state = self.state.read().await;
		Ok(state.node(id).and_then(SnapshotNode::text_node))
	}

	async fn text_descendants(&self, root: &NodeId) -> HostResult<Vec<TextNode>> {
		let state = self.state.read().await;
		Ok(state
			.nodes
			.iter()
			.filter(|node| state.is_descendant(node, root))
			.filter_map(SnapshotNode::text_node)
			.collect())
	}

	async fn bind_characters(&self, node: &NodeId, variable: &VariableId) -> HostResult<()> {
		let mut state = self.state.write().await;
		if !state.variables.iter().any(|candidate| &candidate.id == variable) {
			return Err(HostError::NotFound(variable.to_string()));
		}

		let target = state.node_mut(node)?;
		if target.kind != NodeKind::Text {
			return Err(HostError::Rejected(format!("`{node}` is not a text node")));
		}
		target.bound_characters = Some(VariableAlias::to(variable));

		Ok(())
	}

	async fn set_instance_property(
		&self,
		instance: &NodeId,
		property: &str,
		alias: VariableAlias,
	) -> HostResult<()> {
		let mut state = self.state.write().await;
		let target = state.node_mut(instance)?;
		if target.kind != NodeKind::Instance {
			return Err(HostError::Rejected(format!("`{instance}` is not an instance")));
		}

		let slot = target
			.component_properties
			.get_mut(property)
			.ok_or_else(|| {
				HostError::Rejected(format!("instance `{instance}` has no property `{property}`"))
			})?;
		slot.bound_variable = Some(alias);

		Ok(())
	}

	async fn instance_property_binding(
		&self,
		instance: &NodeId,
		property: &str,
	) -> HostResult<Option<VariableAlias>> {
		let state = self.state.read().await;
		Ok(state
			.node(instance)
			.and_then(|node| node.component_properties.get(property))
			.and_then(|slot| slot.bound_variable.clone()))
	}
}

/// Document-scoped storage.
impl BlobStore for MemoryHost {
	async fn load(&self, key: &str) -> HostResult<Option<String>> {
		Ok(self.state.read().await.plugin_data.get(key).cloned())
	}

	async fn save(&self, key: &str, blob: String) -> HostResult<()> {
		self.state
			.write()
			.await
			.plugin_data
			.insert(key.to_string(), blob);
		Ok(())
	}

	async fn remove(&self, key: &str) -> HostResult<()> {
		self.state.write().await.plugin_data.remove(key);
		Ok(())
	}
}

/// Client-scoped key/value storage with an optional size ceiling.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
	entries: RwLock<BTreeMap<String, String>>,
	capacity: Option<usize>,
}

impl MemoryBlobStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			entries: RwLock::default(),
			capacity: Some(capacity),
		}
	}

	/// Use `entries` as the initial contents.
	#[must_use]
	pub fn with_entries(self, entries: BTreeMap<String, String>) -> Self {
		Self {
			entries: RwLock::new(entries),
			..self
		}
	}

	pub fn capacity(&self) -> Option<usize> {
		self.capacity
	}

	/// Bytes used by keys and values.
	pub async fn used(&self) -> usize {
		stored_size(&*self.entries.read().await)
	}

	pub async fn entries(&self) -> BTreeMap<String, String> {
		self.entries.read().await.clone()
	}

	pub async fn to_json(&self) -> TokenSyncResult<String> {
		Ok(serde_json::to_string_pretty(&*self.entries.read().await)?)
	}
}

fn stored_size(entries: &BTreeMap<String, String>) -> usize {
	entries
		.iter()
		.map(|(key, value)| key.len() + value.len())
		.sum()
}

impl BlobStore for MemoryBlobStore {
	async fn load(&self, key: &str) -> HostResult<Option<String>> {
		Ok(self.entries.read().await.get(key).cloned())
	}

	async fn save(&self, key: &str, blob: String) -> HostResult<()> {
		let mut entries = self.entries.write().await;
		if let Some(limit) = self.capacity {
			let replaced = entries
				.get(key)
				.map_or(0, |previous| key.len() + previous.len());
			let size = stored_size(&entries) - replaced + key.len() + blob.len();
			if size > limit {
				return Err(HostError::CapacityExceeded { size, limit });
			}
		}

		entries.insert(key.to_string(), blob);
		Ok(())
	}

	async fn remove(&self, key: &str) -> HostResult<()> {
		self.entries.write().await.remove(key);
		Ok(())
	}
}
