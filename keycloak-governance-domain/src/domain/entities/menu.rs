use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Node of the console menu tree a role profile selects from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    /// `id`, falling back to `code`; `None` when neither is usable
    pub fn selection_key(&self) -> Option<&str> {
        [self.id.as_deref(), self.code.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|key| !key.is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.path.as_deref())
            .or(self.selection_key())
            .unwrap_or_default()
    }
}

/// A menu node together with its nesting depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatMenuEntry<'a> {
    pub node: &'a MenuNode,
    pub key: &'a str,
    pub depth: usize,
}

/// Menu tree as returned by the menu configuration API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuTree {
    pub roots: Vec<MenuNode>,
}

impl MenuTree {
    pub fn new(roots: Vec<MenuNode>) -> Self {
        Self { roots }
    }

    /// Depth-first walk, parents before children. Keyless nodes are skipped
    /// but their children are still visited at the same depth they would have had.
    pub fn flatten(&self) -> Vec<FlatMenuEntry<'_>> {
        let mut entries = Vec::new();
        for root in &self.roots {
            Self::walk(root, 0, &mut entries);
        }
        entries
    }

    fn walk<'a>(node: &'a MenuNode, depth: usize, entries: &mut Vec<FlatMenuEntry<'a>>) {
        if let Some(key) = node.selection_key() {
            entries.push(FlatMenuEntry { node, key, depth });
        }
        for child in &node.children {
            Self::walk(child, depth + 1, entries);
        }
    }

    pub fn selection_keys(&self) -> Vec<String> {
        self.flatten()
            .into_iter()
            .map(|entry| entry.key.to_string())
            .collect()
    }

    /// Drop selected ids that no longer exist in the tree, keeping order
    pub fn retain_known(&self, selection: &[String]) -> Vec<String> {
        let known: HashSet<&str> = self.flatten().into_iter().map(|entry| entry.key).collect();
        let mut seen = HashSet::new();

        selection
            .iter()
            .map(|id| id.trim())
            .filter(|id| known.contains(id) && seen.insert(*id))
            .map(str::to_string)
            .collect()
    }
}
