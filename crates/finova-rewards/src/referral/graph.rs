//! Referral forest
//!
//! Arena of nodes keyed by user id with parent pointers. Every user has at
//! most one referrer, so cycle detection on insert is an O(depth) walk up
//! from the referrer.

use finova_common::{FinovaError, Result, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct Node {
    parent: Option<UserId>,
    children: Vec<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferralForest {
    nodes: HashMap<UserId, Node>,
    edges: usize,
}

impl ReferralForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user as a root; no-op if already known
    pub fn add_node(&mut self, user: UserId) {
        self.nodes.entry(user).or_default();
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.nodes.contains_key(user)
    }

    /// Check that `referrer -> referee` keeps the graph a forest
    pub fn check_edge(&self, referrer: &UserId, referee: &UserId) -> Result<()> {
        let rejected = || FinovaError::CycleOrDuplicateParent {
            referrer: referrer.to_string(),
            referee: referee.to_string(),
        };

        if !self.contains(referrer) || !self.contains(referee) {
            return Err(FinovaError::InvalidInput(format!(
                "unknown user in referral edge {} -> {}",
                referrer, referee
            )));
        }
        if referrer == referee {
            return Err(rejected());
        }
        if self.parent(referee).is_some() {
            return Err(rejected());
        }
        if self.is_ancestor(referee, referrer) {
            return Err(rejected());
        }
        Ok(())
    }

    /// Insert `referrer -> referee`; on error the forest is unchanged
    pub fn add_edge(&mut self, referrer: &UserId, referee: &UserId) -> Result<()> {
        self.check_edge(referrer, referee)?;

        if let Some(node) = self.nodes.get_mut(referee) {
            node.parent = Some(referrer.clone());
        }
        if let Some(node) = self.nodes.get_mut(referrer) {
            node.children.push(referee.clone());
        }
        self.edges += 1;
        Ok(())
    }

    pub fn parent(&self, user: &UserId) -> Option<&UserId> {
        self.nodes.get(user).and_then(|n| n.parent.as_ref())
    }

    pub fn children(&self, user: &UserId) -> &[UserId] {
        self.nodes
            .get(user)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `ancestor` is reachable by walking up from `user` (inclusive)
    pub fn is_ancestor(&self, ancestor: &UserId, user: &UserId) -> bool {
        let mut current = Some(user);
        while let Some(u) = current {
            if u == ancestor {
                return true;
            }
            current = self.parent(u);
        }
        false
    }

    /// Ancestors nearest first; index in the result is the depth (0 = referrer)
    pub fn ancestors(&self, user: &UserId, max_depth: u32) -> Vec<UserId> {
        let mut out = Vec::new();
        let mut current = self.parent(user);
        while let Some(u) = current {
            if out.len() >= max_depth as usize {
                break;
            }
            out.push(u.clone());
            current = self.parent(u);
        }
        out
    }

    /// Descendants within `max_depth` levels below `user`
    pub fn network_size(&self, user: &UserId, max_depth: u32) -> u64 {
        let mut size = 0u64;
        let mut level: Vec<&UserId> = vec![user];
        for _ in 0..max_depth {
            let next: Vec<&UserId> = level.iter().flat_map(|u| self.children(u)).collect();
            if next.is_empty() {
                break;
            }
            size += next.len() as u64;
            level = next;
        }
        size
    }

    /// Distance to the root
    pub fn depth(&self, user: &UserId) -> usize {
        self.ancestors(user, u32::MAX).len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges
    }
}
