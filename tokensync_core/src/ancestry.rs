//! Recovering the chain of component instances that own a node.
//!
//! The host does not expose instance ownership directly for nodes inside
//! instances. Their ids encode it instead: a node inside an instance is
//! addressed as `<instance>;<child>`, and nesting repeats the pattern, so
//! every proper prefix of the path names a potential owner. Decoding lives
//! behind [`AncestryDecoder`] so callers never depend on the encoding.

use futures::future::join_all;
use tracing::debug;
use tracing::warn;

use crate::NodeId;
use crate::NodeKind;
use crate::SceneGraph;
use crate::SceneNode;

pub const DEFAULT_PATH_DELIMITER: char = ';';

pub trait AncestryDecoder {
	/// Ids of every potential owner of `node`, outermost first. The node
	/// itself is not included.
	fn ancestor_ids(&self, node: &NodeId) -> Vec<NodeId>;
}

/// Decodes ownership from delimiter-joined node id paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathEncodedAncestry {
	delimiter: char,
}

impl PathEncodedAncestry {
	pub fn new(delimiter: char) -> Self {
		Self { delimiter }
	}
}

impl Default for PathEncodedAncestry {
	fn default() -> Self {
		Self::new(DEFAULT_PATH_DELIMITER)
	}
}

impl AncestryDecoder for PathEncodedAncestry {
	fn ancestor_ids(&self, node: &NodeId) -> Vec<NodeId> {
		let segments: Vec<&str> = node.split(self.delimiter).collect();
		let mut prefix = String::new();
		let mut ids = Vec::with_capacity(segments.len().saturating_sub(1));

		for segment in &segments[..segments.len().saturating_sub(1)] {
			if !prefix.is_empty() {
				prefix.push(self.delimiter);
			}
			prefix.push_str(segment);
			ids.push(NodeId::new(prefix.clone()));
		}

		ids
	}
}

/// Resolve the live component instances that own `node`, outermost first.
///
/// Prefixes that no longer resolve, or that the host fails to look up, are
/// skipped.
pub async fn ancestor_instances<G, D>(graph: &G, decoder: &D, node: &NodeId) -> Vec<SceneNode>
where
	G: SceneGraph,
	D: AncestryDecoder + ?Sized,
{
	let lookups = decoder.ancestor_ids(node).into_iter().map(|id| {
		async move {
			match graph.node_by_id(&id).await {
				Ok(Some(found)) if found.kind == NodeKind::Instance => Some(found),
				Ok(Some(_)) => None,
				Ok(None) => {
					debug!(ancestor = %id, node = %node, "ancestor no longer exists");
					None
				}
				Err(error) => {
					warn!(ancestor = %id, node = %node, %error, "failed to resolve ancestor");
					None
				}
			}
		}
	});

	join_all(lookups).await.into_iter().flatten().collect()
}
