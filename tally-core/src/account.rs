//! The hierarchical chart of accounts.
//!
//! Accounts form a tree rooted at the master account. The tree is an
//! index-addressed arena: nodes refer to each other by slot, the account
//! owns its children, and postings are referenced (never owned) through
//! back-links. This keeps the account ↔ posting cycle free of owning
//! references.

use std::collections::BTreeMap;

use crate::entry::XactIdx;

/// Slot index into an [`AccountTree`].
pub type AccountIdx = u32;

/// Slot of the master (root) account in every tree.
pub const MASTER_ACCOUNT: AccountIdx = 0;

/// A named node in the chart of accounts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub name: String,
    pub note: String,
    /// Distance from the master account (master itself is 0).
    pub depth: u16,
    pub parent: Option<AccountIdx>,
    /// Children keyed by name; iteration order is name order.
    pub children: BTreeMap<String, AccountIdx>,
    /// Postings charged to this account, in journal order. Non-owning.
    pub xacts: Vec<XactIdx>,
}

/// Index-addressed account arena; slot 0 is the master account.
#[derive(Debug, Clone)]
pub struct AccountTree {
    nodes: Vec<Account>,
}

impl AccountTree {
    /// A tree holding only an unnamed master account.
    pub fn new() -> Self {
        Self {
            nodes: vec![Account::default()],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing beyond the mandatory master account.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn master(&self) -> &Account {
        &self.nodes[MASTER_ACCOUNT as usize]
    }

    pub fn master_mut(&mut self) -> &mut Account {
        &mut self.nodes[MASTER_ACCOUNT as usize]
    }

    pub fn get(&self, idx: AccountIdx) -> Option<&Account> {
        self.nodes.get(idx as usize)
    }

    pub fn get_mut(&mut self, idx: AccountIdx) -> Option<&mut Account> {
        self.nodes.get_mut(idx as usize)
    }

    /// Add a child account under `parent`, or return the existing child of
    /// that name. Depth is derived from the parent.
    ///
    /// `parent` must be a slot already in the tree.
    pub fn add_account(&mut self, parent: AccountIdx, name: impl Into<String>) -> AccountIdx {
        let name = name.into();
        let parent_node = &self.nodes[parent as usize];
        if let Some(&existing) = parent_node.children.get(&name) {
            return existing;
        }
        let depth = parent_node.depth + 1;
        let idx = self.nodes.len() as AccountIdx;
        self.nodes.push(Account {
            name: name.clone(),
            depth,
            parent: Some(parent),
            ..Account::default()
        });
        self.nodes[parent as usize].children.insert(name, idx);
        idx
    }

    /// Resolve a colon-separated path (`"Assets:Cash"`) from the master.
    pub fn find(&self, path: &str) -> Option<AccountIdx> {
        let mut idx = MASTER_ACCOUNT;
        for segment in path.split(':') {
            idx = *self.nodes[idx as usize].children.get(segment)?;
        }
        Some(idx)
    }

    /// Resolve a colon-separated path, creating missing segments.
    pub fn find_or_create(&mut self, path: &str) -> AccountIdx {
        let mut idx = MASTER_ACCOUNT;
        for segment in path.split(':') {
            idx = self.add_account(idx, segment);
        }
        idx
    }

    /// The colon-joined path of an account, master excluded.
    pub fn fullname(&self, idx: AccountIdx) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            let node = &self.nodes[i as usize];
            if node.parent.is_none() {
                break;
            }
            segments.push(node.name.as_str());
            cursor = node.parent;
        }
        segments.reverse();
        segments.join(":")
    }

    /// Back-link a posting into its account's transaction list.
    pub fn add_transaction(&mut self, account: AccountIdx, xact: XactIdx) {
        self.nodes[account as usize].xacts.push(xact);
    }

    /// Iterate all accounts in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (AccountIdx, &Account)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, a)| (i as AccountIdx, a))
    }
}

impl Default for AccountTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_create_builds_intermediates() {
        let mut tree = AccountTree::new();
        assert!(tree.is_empty());
        let cash = tree.find_or_create("Assets:Cash");
        assert!(!tree.is_empty());
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.fullname(cash), "Assets:Cash");
        assert_eq!(tree.get(cash).unwrap().depth, 2);

        let assets = tree.find("Assets").unwrap();
        assert_eq!(tree.get(assets).unwrap().depth, 1);
        assert_eq!(tree.get(assets).unwrap().parent, Some(MASTER_ACCOUNT));
    }

    #[test]
    fn test_find_or_create_reuses_existing() {
        let mut tree = AccountTree::new();
        let a = tree.find_or_create("Assets:Cash");
        let b = tree.find_or_create("Assets:Cash");
        assert_eq!(a, b);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_find_missing() {
        let tree = AccountTree::new();
        assert_eq!(tree.find("Assets"), None);
    }

    #[test]
    fn test_children_iterate_in_name_order() {
        let mut tree = AccountTree::new();
        tree.find_or_create("Expenses");
        tree.find_or_create("Assets");
        tree.find_or_create("Liabilities");
        let names: Vec<&String> = tree.master().children.keys().collect();
        assert_eq!(names, ["Assets", "Expenses", "Liabilities"]);
    }

    #[test]
    fn test_fullname_of_master_is_empty() {
        let tree = AccountTree::new();
        assert_eq!(tree.fullname(MASTER_ACCOUNT), "");
    }
}
