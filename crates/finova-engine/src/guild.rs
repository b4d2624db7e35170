//! Guild membership registry

use dashmap::DashMap;
use finova_common::{FinovaError, GuildId, Result, UserId};
use std::collections::BTreeSet;

pub struct GuildRegistry {
    max_size: usize,
    members: DashMap<GuildId, BTreeSet<UserId>>,
}

impl GuildRegistry {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            members: DashMap::new(),
        }
    }

    /// Claim a seat in `guild_id`; fails when the guild is full
    pub fn reserve(&self, guild_id: &GuildId, user_id: &UserId) -> Result<()> {
        let mut members = self.members.entry(guild_id.clone()).or_default();
        if members.contains(user_id) {
            return Ok(());
        }
        if members.len() >= self.max_size {
            return Err(FinovaError::InvalidInput(format!(
                "guild {} is full ({} members)",
                guild_id, self.max_size
            )));
        }
        members.insert(user_id.clone());
        Ok(())
    }

    /// Record membership without a size check (ledger replay)
    pub fn insert(&self, guild_id: &GuildId, user_id: &UserId) {
        self.members
            .entry(guild_id.clone())
            .or_default()
            .insert(user_id.clone());
    }

    pub fn release(&self, guild_id: &GuildId, user_id: &UserId) {
        let emptied = match self.members.get_mut(guild_id) {
            Some(mut members) => {
                members.remove(user_id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.members.remove_if(guild_id, |_, m| m.is_empty());
        }
    }

    pub fn members(&self, guild_id: &GuildId) -> Vec<UserId> {
        self.members
            .get(guild_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn size(&self, guild_id: &GuildId) -> usize {
        self.members.get(guild_id).map(|m| m.len()).unwrap_or(0)
    }
}
