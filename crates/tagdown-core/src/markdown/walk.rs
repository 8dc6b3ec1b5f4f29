//! Pre/post-order traversal over the document tree

use super::elements::Node;

/// What the walker should do after visiting a node on the way in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    Continue,
    /// Don't descend; the node is still visited on the way out
    SkipChildren,
}

/// Visit every node twice: `entering == true` before its children,
/// `entering == false` after them.
///
/// The status returned on the leaving visit is ignored. The first error aborts
/// the walk.
pub fn walk<E, F>(node: &Node, visit: &mut F) -> Result<(), E>
where
    F: FnMut(&Node, bool) -> Result<WalkStatus, E>,
{
    if visit(node, true)? == WalkStatus::Continue {
        for child in &node.children {
            walk(child, visit)?;
        }
    }
    visit(node, false)?;
    Ok(())
}
