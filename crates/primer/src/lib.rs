//! Copy-on-write trie: a persistent dictionary keyed by byte strings.
//!
//! Every update returns a new trie; old versions stay valid and share all
//! untouched subtrees with the new one. Nodes are never mutated after
//! publication, so any number of threads may read any version without
//! coordination.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type ValueObj = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
struct TrieNode {
    children: HashMap<u8, Arc<TrieNode>>,
    /// Present iff this is a value node. The payload is type-erased; readers
    /// downcast and get `None` on mismatch.
    value: Option<ValueObj>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }
}

/// Handle to one immutable version of the dictionary.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key`, returning the stored value if it exists and has
    /// dynamic type `T`.
    pub fn get<T: Send + Sync + 'static>(&self, key: &[u8]) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        for byte in key {
            node = node.children.get(byte)?;
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Returns a trie where `key` maps to `value`, replacing any prior
    /// mapping. Subtrees off the key's path are shared with `self`.
    pub fn put<T: Send + Sync + 'static>(&self, key: &[u8], value: T) -> Trie {
        let root = put_path(self.root.as_deref(), key, Arc::new(value));
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    /// Returns a trie without a value at `key`. Interior nodes left with no
    /// value and no children are pruned bottom-up; if nothing remains the
    /// result is empty. An absent key yields an unchanged trie.
    pub fn remove(&self, key: &[u8]) -> Trie {
        let Some(root) = self.root.as_deref() else {
            return self.clone();
        };
        match remove_path(root, key) {
            None => self.clone(),
            Some(root) => Trie { root },
        }
    }
}

/// Rebuilds the path to `key`, aliasing everything else.
fn put_path(node: Option<&TrieNode>, key: &[u8], value: ValueObj) -> TrieNode {
    let mut next = node.cloned().unwrap_or_default();
    match key.split_first() {
        None => {
            next.value = Some(value);
        }
        Some((&first, rest)) => {
            let child = put_path(next.children.get(&first).map(|child| &**child), rest, value);
            next.children.insert(first, Arc::new(child));
        }
    }
    next
}

/// Clears the value at `key` below `node`.
///
/// `None` means the key was absent and nothing changed; `Some(None)` means
/// the whole subtree pruned away; `Some(Some(n))` is the replacement node.
fn remove_path(node: &TrieNode, key: &[u8]) -> Option<Option<Arc<TrieNode>>> {
    match key.split_first() {
        None => {
            node.value.as_ref()?;
            let mut cleared = node.clone();
            cleared.value = None;
            if cleared.is_empty() {
                Some(None)
            } else {
                Some(Some(Arc::new(cleared)))
            }
        }
        Some((&first, rest)) => {
            let child = node.children.get(&first)?;
            let replacement = remove_path(child, rest)?;
            let mut next = node.clone();
            match replacement {
                Some(child) => {
                    next.children.insert(first, child);
                }
                None => {
                    next.children.remove(&first);
                }
            }
            if next.is_empty() {
                Some(None)
            } else {
                Some(Some(Arc::new(next)))
            }
        }
    }
}
