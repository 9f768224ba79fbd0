use std::collections::HashSet;

use futures::future::try_join_all;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::AncestryDecoder;
use crate::HostError;
use crate::HostResult;
use crate::NodeId;
use crate::NodeKind;
use crate::SceneGraph;
use crate::TextNode;
use crate::TextScope;
use crate::TokenSyncError;
use crate::TokenSyncResult;
use crate::ancestry::ancestor_instances;

/// Which text nodes survive [`filter_text_nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
	/// Keep text inside component and variant definitions.
	pub include_components: bool,
	/// Keep text owned by component instances.
	pub include_instances: bool,
}

impl Default for NodeFilter {
	fn default() -> Self {
		Self {
			include_components: true,
			include_instances: false,
		}
	}
}

impl NodeFilter {
	pub fn keeps_everything(self) -> bool {
		self.include_components && self.include_instances
	}
}

/// Gather the text nodes a scope covers, in document order and without
/// repeats.
///
/// For a selection, selected text nodes are taken as they are and selected
/// containers contribute every text node below them. Other selected nodes
/// are ignored.
pub async fn collect_text_nodes<G: SceneGraph>(
	graph: &G,
	scope: TextScope,
) -> TokenSyncResult<Vec<TextNode>> {
	let nodes = match scope {
		TextScope::Selection => {
			let selection = graph.selection().await?;
			if selection.is_empty() {
				return Err(TokenSyncError::NothingSelected);
			}

			let lookups = selection.iter().map(|node| {
				async move {
					if node.kind == NodeKind::Text {
						let found = graph.text_node(&node.id).await?;
						Ok::<Vec<TextNode>, HostError>(found.into_iter().collect())
					} else if node.kind.is_text_container() {
						graph.text_descendants(&node.id).await
					} else {
						Ok(Vec::new())
					}
				}
			});

			try_join_all(lookups).await?.into_iter().flatten().collect()
		}
		TextScope::CurrentPage => {
			let page = graph.current_page().await?;
			graph.text_descendants(&page.id).await?
		}
		TextScope::AllPages => {
			let mut nodes = Vec::new();
			for page in graph.pages().await? {
				graph.load_page(&page.id).await?;
				nodes.extend(graph.text_descendants(&page.id).await?);
			}
			nodes
		}
	};

	let nodes = unique_by_id(nodes);
	debug!(%scope, count = nodes.len(), "collected text nodes");

	Ok(nodes)
}

fn unique_by_id(nodes: Vec<TextNode>) -> Vec<TextNode> {
	let mut seen = HashSet::new();
	nodes
		.into_iter()
		.filter(|node| seen.insert(node.id.clone()))
		.collect()
}

/// Whether `node` sits inside a component or variant definition.
///
/// Walks up the parent chain and stops at the first page or document. A node
/// that vanished mid-walk counts as outside.
pub async fn is_inside_definition<G: SceneGraph>(graph: &G, node: &NodeId) -> HostResult<bool> {
	let mut current = node.clone();

	loop {
		let parent = match graph.parent(&current).await {
			Ok(Some(parent)) => parent,
			Ok(None) | Err(HostError::NotFound(_)) => return Ok(false),
			Err(error) => return Err(error),
		};

		match parent.kind {
			NodeKind::Component | NodeKind::ComponentSet => return Ok(true),
			NodeKind::Page | NodeKind::Document => return Ok(false),
			_ => current = parent.id,
		}
	}
}

/// Drop text nodes the filter excludes. Order is preserved.
pub async fn filter_text_nodes<G, D>(
	graph: &G,
	decoder: &D,
	nodes: Vec<TextNode>,
	filter: NodeFilter,
) -> HostResult<Vec<TextNode>>
where
	G: SceneGraph,
	D: AncestryDecoder + ?Sized,
{
	if filter.keeps_everything() {
		return Ok(nodes);
	}

	let checks = nodes.iter().map(|node| {
		async move {
			if !filter.include_components && is_inside_definition(graph, &node.id).await? {
				debug!(node = %node.id, "excluding text inside a component definition");
				return Ok::<_, HostError>(false);
			}

			if !filter.include_instances
				&& !ancestor_instances(graph, decoder, &node.id).await.is_empty()
			{
				debug!(node = %node.id, "excluding text owned by an instance");
				return Ok(false);
			}

			Ok(true)
		}
	});
	let keep = try_join_all(checks).await?;

	Ok(nodes
		.into_iter()
		.zip(keep)
		.filter_map(|(node, keep)| keep.then_some(node))
		.collect())
}
