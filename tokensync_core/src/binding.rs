use std::fmt;

use futures::future::join_all;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::AncestryDecoder;
use crate::CachedVariable;
use crate::HostError;
use crate::HostResult;
use crate::LibraryCatalog;
use crate::NodeId;
use crate::NodeKind;
use crate::PathEncodedAncestry;
use crate::SceneGraph;
use crate::SceneNode;
use crate::TextNode;
use crate::TokenSyncError;
use crate::TokenSyncResult;
use crate::VariableAlias;
use crate::VariableId;
use crate::VariableStore;
use crate::ancestry::ancestor_instances;
use crate::variables::resolve_live_variable;

/// Where a binding for a text node has to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum BindingTarget {
	/// The node's own text content.
	DirectText { node: NodeId },
	/// An overridable property on the nearest instance that owns the node.
	/// Writing here keeps per-instance overrides intact.
	InstanceProperty { instance: NodeId, property: String },
}

impl fmt::Display for BindingTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::DirectText { node } => write!(f, "text `{node}`"),
			Self::InstanceProperty { instance, property } => {
				write!(f, "property `{property}` of instance `{instance}`")
			}
		}
	}
}

/// Decides where a variable binding for a text node belongs and writes it.
///
/// Nothing is cached between calls: ownership is re-derived from the live
/// tree every time.
#[derive(Debug)]
pub struct BindingResolver<'a, G, D = PathEncodedAncestry> {
	graph: &'a G,
	decoder: D,
}

impl<'a, G: SceneGraph> BindingResolver<'a, G> {
	pub fn new(graph: &'a G) -> Self {
		Self::with_decoder(graph, PathEncodedAncestry::default())
	}
}

impl<'a, G: SceneGraph, D: AncestryDecoder> BindingResolver<'a, G, D> {
	pub fn with_decoder(graph: &'a G, decoder: D) -> Self {
		Self { graph, decoder }
	}

	pub fn graph(&self) -> &'a G {
		self.graph
	}

	pub fn decoder(&self) -> &D {
		&self.decoder
	}

	/// Live instances owning `node`, outermost first.
	pub async fn ancestor_instances(&self, node: &NodeId) -> Vec<SceneNode> {
		ancestor_instances(self.graph, &self.decoder, node).await
	}

	pub async fn resolve(&self, node: &TextNode) -> BindingTarget {
		let ancestors = self.ancestor_instances(&node.id).await;
		let direct = || {
			BindingTarget::DirectText {
				node: node.id.clone(),
			}
		};

		let Some(nearest) = ancestors.last() else {
			return direct();
		};

		match node.characters_property() {
			Some(property) => {
				BindingTarget::InstanceProperty {
					instance: nearest.id.clone(),
					property: property.to_string(),
				}
			}
			None => direct(),
		}
	}

	/// Bind `variable` to `node`, returning the place it was written.
	pub async fn bind(&self, node: &TextNode, variable: &VariableId) -> HostResult<BindingTarget> {
		let target = self.resolve(node).await;

		match &target {
			BindingTarget::DirectText { node } => {
				self.graph.bind_characters(node, variable).await?;
			}
			BindingTarget::InstanceProperty { instance, property } => {
				self.graph
					.set_instance_property(instance, property, VariableAlias::to(variable))
					.await?;
			}
		}

		debug!(node = %node.id, variable = %variable, %target, "bound variable");
		Ok(target)
	}
}

/// Bind one variable to every text node in the current selection.
///
/// Only directly selected text nodes are considered; containers are ignored.
pub async fn apply_variable<H, D>(
	host: &H,
	resolver: &BindingResolver<'_, H, D>,
	variable: &CachedVariable,
) -> TokenSyncResult<Vec<BindingTarget>>
where
	H: SceneGraph + VariableStore + LibraryCatalog,
	D: AncestryDecoder,
{
	let selection = host.selection().await?;
	if selection.is_empty() {
		return Err(TokenSyncError::NothingSelected);
	}

	let text_ids: Vec<NodeId> = selection
		.into_iter()
		.filter(|node| node.kind == NodeKind::Text)
		.map(|node| node.id)
		.collect();
	let lookups = text_ids.iter().map(|id| host.text_node(id));
	let text_nodes: Vec<TextNode> = try_join_all(lookups).await?.into_iter().flatten().collect();

	if text_nodes.is_empty() {
		return Err(TokenSyncError::NoTextSelected);
	}

	let Some(live) = resolve_live_variable(host, variable).await? else {
		return Err(TokenSyncError::VariableNotFound(variable.id.to_string()));
	};

	let bindings = text_nodes
		.iter()
		.map(|node| resolver.bind(node, &live.id));
	let mut targets = Vec::with_capacity(text_nodes.len());
	for (node, outcome) in text_nodes.iter().zip(join_all(bindings).await) {
		match outcome {
			Ok(target) => targets.push(target),
			Err(HostError::NotFound(missing)) => {
				warn!(node = %node.id, %missing, "text node vanished before binding");
			}
			Err(error) => return Err(error.into()),
		}
	}

	info!(variable = %live.name, count = targets.len(), "applied variable to selection");
	Ok(targets)
}
