use std::collections::HashMap;

use crate::bson::path::Path;

/// A trie over path segments with a terminal payload per claimed path.
///
/// Used to accumulate per-path state while walking a set of dotted paths,
/// primarily to detect overlapping update-operator targets: a path
/// conflicts when a strict prefix of it is already claimed, when it is
/// claimed itself, or when a longer path below it is claimed.
#[derive(Debug)]
pub struct PathNode<T> {
    children: HashMap<String, PathNode<T>>,
    end: Option<T>,
}

impl<T> Default for PathNode<T> {
    fn default() -> Self {
        PathNode {
            children: HashMap::new(),
            end: None,
        }
    }
}

impl<T> PathNode<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a path, attaching its payload. Returns false without
    /// modifying the trie when the path overlaps an existing claim.
    pub fn insert(&mut self, path: &Path, payload: T) -> bool {
        let mut node = self;
        for segment in path.segments() {
            if node.end.is_some() {
                return false;
            }
            node = node.children.entry(segment.clone()).or_default();
        }
        if node.end.is_some() || !node.children.is_empty() {
            return false;
        }
        node.end = Some(payload);
        true
    }

    /// Payload attached at exactly this path, if claimed.
    pub fn get(&self, path: &Path) -> Option<&T> {
        let mut node = self;
        for segment in path.segments() {
            node = node.children.get(segment)?;
        }
        node.end.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_paths() {
        let mut trie = PathNode::new();
        assert!(trie.insert(&Path::parse("a.b"), 1));
        assert!(trie.insert(&Path::parse("a.c"), 2));
        assert!(trie.insert(&Path::parse("x"), 3));
        assert_eq!(trie.get(&Path::parse("a.b")), Some(&1));
        assert_eq!(trie.get(&Path::parse("a")), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut trie = PathNode::new();
        assert!(trie.insert(&Path::parse("a.b"), 1));
        assert!(!trie.insert(&Path::parse("a.b"), 2));
        assert_eq!(trie.get(&Path::parse("a.b")), Some(&1));
    }

    #[test]
    fn test_prefix_overlap_rejected() {
        let mut trie = PathNode::new();
        assert!(trie.insert(&Path::parse("a.b"), 1));
        // claimed path above and below an existing claim
        assert!(!trie.insert(&Path::parse("a"), 2));
        assert!(!trie.insert(&Path::parse("a.b.c"), 3));
    }

    #[test]
    fn test_root_claim_blocks_everything() {
        let mut trie = PathNode::new();
        assert!(trie.insert(&Path::root(), 0));
        assert!(!trie.insert(&Path::parse("a"), 1));
    }
}
