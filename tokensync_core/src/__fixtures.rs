use std::collections::BTreeMap;

use crate::CollectionId;
use crate::ComponentPropertyReferences;
use crate::DocumentSnapshot;
use crate::ExternalRow;
use crate::HostError;
use crate::HostResult;
use crate::InstanceProperty;
use crate::LibraryCatalog;
use crate::LibraryCollection;
use crate::LibrarySnapshot;
use crate::LibraryVariable;
use crate::MemoryHost;
use crate::Mode;
use crate::ModeId;
use crate::NodeId;
use crate::NodeKind;
use crate::ResolvedType;
use crate::SceneGraph;
use crate::SceneNode;
use crate::SnapshotNode;
use crate::SyncRequest;
use crate::TextNode;
use crate::Variable;
use crate::VariableAlias;
use crate::VariableCollection;
use crate::VariableId;
use crate::VariableScope;
use crate::VariableStore;
use crate::VariableValue;

pub const MESSAGES: &str = "VariableCollectionId:1:0";
pub const LIBRARY_KEY: &str = "lib-key-1";

pub fn node(id: &str, kind: NodeKind, parent: Option<&str>) -> SnapshotNode {
	SnapshotNode::new(id, kind, parent.map(NodeId::from).as_ref())
}

pub fn text(id: &str, parent: &str, characters: &str) -> SnapshotNode {
	SnapshotNode {
		characters: Some(characters.to_string()),
		..node(id, NodeKind::Text, Some(parent))
	}
}

/// A text node whose content is driven by an instance property.
pub fn property_text(id: &str, parent: &str, characters: &str, property: &str) -> SnapshotNode {
	SnapshotNode {
		component_property_references: ComponentPropertyReferences {
			characters: Some(property.to_string()),
		},
		..text(id, parent, characters)
	}
}

pub fn instance(id: &str, parent: &str, properties: &[(&str, &str)]) -> SnapshotNode {
	SnapshotNode {
		component_properties: properties
			.iter()
			.map(|(name, value)| {
				(
					(*name).to_string(),
					InstanceProperty {
						value: (*value).to_string(),
						bound_variable: None,
					},
				)
			})
			.collect(),
		..node(id, NodeKind::Instance, Some(parent))
	}
}

/// A collection whose first mode is the default.
pub fn collection(id: &str, name: &str, modes: &[(&str, &str)]) -> VariableCollection {
	let modes: Vec<Mode> = modes
		.iter()
		.map(|(mode_id, name)| {
			Mode {
				mode_id: ModeId::from(*mode_id),
				name: (*name).to_string(),
			}
		})
		.collect();

	VariableCollection {
		id: CollectionId::from(id),
		name: name.to_string(),
		default_mode_id: modes[0].mode_id.clone(),
		modes,
	}
}

pub fn string_variable(
	id: &str,
	name: &str,
	collection: &str,
	values: &[(&str, &str)],
) -> Variable {
	Variable {
		id: VariableId::from(id),
		key: format!("key-{id}"),
		name: name.to_string(),
		collection_id: CollectionId::from(collection),
		resolved_type: ResolvedType::String,
		values_by_mode: values
			.iter()
			.map(|(mode, value)| (ModeId::from(*mode), VariableValue::from(*value)))
			.collect(),
		scopes: vec![VariableScope::TextContent],
		description: String::new(),
		remote: false,
		hidden_from_publishing: false,
	}
}

pub fn row(id: &str, key: &str, values: &[(&str, &str)]) -> ExternalRow {
	ExternalRow {
		id: id.to_string(),
		key: key.to_string(),
		values: values
			.iter()
			.map(|(name, value)| ((*name).to_string(), (*value).to_string()))
			.collect(),
		created_time: "2024-01-01T00:00:00.000Z".to_string(),
		last_edited_time: "2024-01-02T00:00:00.000Z".to_string(),
		url: format!("https://example.com/{id}"),
	}
}

pub fn sync_request(rows: Vec<ExternalRow>) -> SyncRequest {
	SyncRequest {
		collection_name: "Messages".to_string(),
		rows,
		value_properties: vec!["ja".to_string(), "en".to_string()],
	}
}

/// Two pages of text.
///
/// ```text
/// 0:0 document
/// ├── 1:1 page "Home" (current)
/// │   ├── 2:1 frame
/// │   │   ├── 2:2 text "Sign in"
/// │   │   ├── 2:3 text "  Sign\n  up "
/// │   │   └── 4:1 instance {label#1 = "Sign in"}
/// │   │       ├── 4:1;3:2 text "Sign in" (label#1)
/// │   │       ├── 4:1;3:3 text "Welcome"
/// │   │       └── 4:1;6:1 instance {title#2 = "OK"}
/// │   │           └── 4:1;6:1;6:2 text "OK" (title#2)
/// │   ├── 3:1 component
/// │   │   └── 3:2 text "Sign in"
/// │   └── 7:1 rectangle
/// └── 5:1 page "Second"
///     └── 5:2 text "Sign up"
/// ```
pub fn document() -> DocumentSnapshot {
	let mut home = node("1:1", NodeKind::Page, Some("0:0"));
	home.name = "Home".to_string();
	let mut second = node("5:1", NodeKind::Page, Some("0:0"));
	second.name = "Second".to_string();

	DocumentSnapshot {
		nodes: vec![
			node("0:0", NodeKind::Document, None),
			home,
			node("2:1", NodeKind::Frame, Some("1:1")),
			text("2:2", "2:1", "Sign in"),
			text("2:3", "2:1", "  Sign\n  up "),
			instance("4:1", "2:1", &[("label#1", "Sign in")]),
			property_text("4:1;3:2", "4:1", "Sign in", "label#1"),
			text("4:1;3:3", "4:1", "Welcome"),
			instance("4:1;6:1", "4:1", &[("title#2", "OK")]),
			property_text("4:1;6:1;6:2", "4:1;6:1", "OK", "title#2"),
			node("3:1", NodeKind::Component, Some("1:1")),
			text("3:2", "3:1", "Sign in"),
			node("7:1", NodeKind::Other("RECTANGLE".into()), Some("1:1")),
			second,
			text("5:2", "5:1", "Sign up"),
		],
		current_page: Some(NodeId::from("1:1")),
		selection: Vec::new(),
		collections: vec![collection(MESSAGES, "Messages", &[("1:0", "ja"), ("1:1", "en")])],
		variables: vec![
			string_variable("VariableID:1:1", "sign_in", MESSAGES, &[
				("1:0", "ログイン"),
				("1:1", "Sign in"),
			]),
			string_variable("VariableID:1:2", "sign_up", MESSAGES, &[
				("1:0", "新規登録"),
				("1:1", "Sign up"),
			]),
			string_variable("VariableID:1:3", "welcome", MESSAGES, &[
				("1:0", "ようこそ"),
				("1:1", "Welcome"),
			]),
		],
		libraries: vec![library()],
		plugin_data: BTreeMap::new(),
		next_id: 100,
	}
}

/// A published library with one string and one float variable.
pub fn library() -> LibrarySnapshot {
	let mut spacing = string_variable("VariableID:lib:2", "spacing/sm", "lib-collection", &[]);
	spacing.key = "lib-var-2".to_string();
	spacing.resolved_type = ResolvedType::Float;
	spacing
		.values_by_mode
		.insert(ModeId::from("9:0"), VariableValue::Float(4.0));

	let mut ok = string_variable("VariableID:lib:1", "common/ok", "lib-collection", &[(
		"9:0", "OK",
	)]);
	ok.key = "lib-var-1".to_string();

	LibrarySnapshot {
		collection: LibraryCollection {
			key: LIBRARY_KEY.to_string(),
			name: "Shared".to_string(),
			library_name: "Design System".to_string(),
		},
		variables: vec![ok, spacing],
	}
}

pub fn host() -> MemoryHost {
	MemoryHost::new(document())
}

pub fn host_with_selection(selection: &[&str]) -> MemoryHost {
	MemoryHost::new(DocumentSnapshot {
		selection: selection.iter().map(|id| NodeId::from(*id)).collect(),
		..document()
	})
}

/// A host whose text node `gone` disappears after it has been read, so
/// every write to it fails with [`HostError::NotFound`].
pub struct VanishingTextHost {
	pub inner: MemoryHost,
	pub gone: NodeId,
}

impl VariableStore for VanishingTextHost {
	async fn local_collections(&self) -> HostResult<Vec<VariableCollection>> {
		self.inner.local_collections().await
	}

	async fn collection_by_id(&self, id: &CollectionId) -> HostResult<Option<VariableCollection>> {
		self.inner.collection_by_id(id).await
	}

	async fn create_collection(&self, name: &str) -> HostResult<VariableCollection> {
		self.inner.create_collection(name).await
	}

	async fn rename_mode(
		&self,
		collection: &CollectionId,
		mode: &ModeId,
		name: &str,
	) -> HostResult<()> {
		self.inner.rename_mode(collection, mode, name).await
	}

	async fn add_mode(&self, collection: &CollectionId, name: &str) -> HostResult<ModeId> {
		self.inner.add_mode(collection, name).await
	}

	async fn remove_mode(&self, collection: &CollectionId, mode: &ModeId) -> HostResult<()> {
		self.inner.remove_mode(collection, mode).await
	}

	async fn local_variables(&self, resolved_type: ResolvedType) -> HostResult<Vec<Variable>> {
		self.inner.local_variables(resolved_type).await
	}

	async fn variable_by_id(&self, id: &VariableId) -> HostResult<Option<Variable>> {
		self.inner.variable_by_id(id).await
	}

	async fn create_variable(
		&self,
		name: &str,
		collection: &CollectionId,
		resolved_type: ResolvedType,
	) -> HostResult<Variable> {
		self.inner.create_variable(name, collection, resolved_type).await
	}

	async fn remove_variable(&self, id: &VariableId) -> HostResult<()> {
		self.inner.remove_variable(id).await
	}

	async fn set_scopes(&self, id: &VariableId, scopes: &[VariableScope]) -> HostResult<()> {
		self.inner.set_scopes(id, scopes).await
	}

	async fn set_value_for_mode(
		&self,
		id: &VariableId,
		mode: &ModeId,
		value: Option<VariableValue>,
	) -> HostResult<()> {
		self.inner.set_value_for_mode(id, mode, value).await
	}
}

impl LibraryCatalog for VanishingTextHost {
	async fn library_collections(&self) -> HostResult<Vec<LibraryCollection>> {
		self.inner.library_collections().await
	}

	async fn library_variables(&self, collection_key: &str) -> HostResult<Vec<LibraryVariable>> {
		self.inner.library_variables(collection_key).await
	}

	async fn import_variable_by_key(&self, key: &str) -> HostResult<Variable> {
		self.inner.import_variable_by_key(key).await
	}
}

impl SceneGraph for VanishingTextHost {
	async fn selection(&self) -> HostResult<Vec<SceneNode>> {
		self.inner.selection().await
	}

	async fn current_page(&self) -> HostResult<SceneNode> {
		self.inner.current_page().await
	}

	async fn pages(&self) -> HostResult<Vec<SceneNode>> {
		self.inner.pages().await
	}

	async fn load_page(&self, page: &NodeId) -> HostResult<()> {
		self.inner.load_page(page).await
	}

	async fn node_by_id(&self, id: &NodeId) -> HostResult<Option<SceneNode>> {
		self.inner.node_by_id(id).await
	}

	async fn parent(&self, id: &NodeId) -> HostResult<Option<SceneNode>> {
		self.inner.parent(id).await
	}

	async fn text_node(&self, id: &NodeId) -> HostResult<Option<TextNode>> {
		self.inner.text_node(id).await
	}

	async fn text_descendants(&self, root: &NodeId) -> HostResult<Vec<TextNode>> {
		self.inner.text_descendants(root).await
	}

	async fn bind_characters(&self, node: &NodeId, variable: &VariableId) -> HostResult<()> {
		if node == &self.gone {
			return Err(HostError::NotFound(node.to_string()));
		}

		self.inner.bind_characters(node, variable).await
	}

	async fn set_instance_property(
		&self,
		instance: &NodeId,
		property: &str,
		alias: VariableAlias,
	) -> HostResult<()> {
		self.inner.set_instance_property(instance, property, alias).await
	}

	async fn instance_property_binding(
		&self,
		instance: &NodeId,
		property: &str,
	) -> HostResult<Option<VariableAlias>> {
		self.inner.instance_property_binding(instance, property).await
	}
}
