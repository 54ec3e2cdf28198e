//! Saved templates, persisted under `templates` as a bounded list.
//!
//! The list is kept oldest-first. Saving into a full list drops the oldest
//! entries first; a save the backend refuses for lack of space evicts one
//! more entry at a time and retries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{load_json, save_json, KeyValueStore};
use crate::template::TemplateData;
use crate::{Error, Result};

pub const TEMPLATES_KEY: &str = "templates";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: u64,
    pub name: String,
    /// Thumbnail as a JPEG data URI
    pub preview: String,
    pub data: TemplateData,
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    items: Vec<Template>,
    max_items: usize,
}

impl TemplateStore {
    pub fn load(store: &dyn KeyValueStore, max_items: usize) -> Result<Self> {
        let items: Vec<Template> = load_json(store, TEMPLATES_KEY)?.unwrap_or_default();
        let mut this = Self {
            items,
            max_items: max_items.max(1),
        };
        if this.items.len() > this.max_items {
            let excess = this.items.len() - this.max_items;
            this.items.drain(..excess);
        }
        Ok(this)
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Oldest first
    pub fn list(&self) -> &[Template] {
        &self.items
    }

    pub fn get(&self, id: u64) -> Option<&Template> {
        self.items.iter().find(|t| t.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Template> {
        self.items.iter().rev().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn next_id(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let newest = self.items.iter().map(|t| t.id).max().unwrap_or(0);
        now.max(newest + 1)
    }

    /// Append a template and persist the list.
    ///
    /// The in-memory list only changes once the backend accepted the write;
    /// if no amount of eviction makes room the quota error is returned and
    /// both the store and this list are left as they were.
    pub fn save(
        &mut self,
        store: &mut dyn KeyValueStore,
        name: &str,
        preview: String,
        data: TemplateData,
    ) -> Result<Template> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("template name is required".into()));
        }

        let template = Template {
            id: self.next_id(),
            name: name.to_string(),
            preview,
            data,
        };

        let mut kept: Vec<Template> = self.items.clone();
        if kept.len() >= self.max_items {
            let excess = kept.len() + 1 - self.max_items;
            log::info!("save_template: list full, dropping {excess} oldest");
            kept.drain(..excess);
        }

        loop {
            let mut candidate = kept.clone();
            candidate.push(template.clone());
            match save_json(store, TEMPLATES_KEY, &candidate) {
                Ok(()) => {
                    self.items = candidate;
                    log::info!(
                        "save_template: '{}' stored as {} ({} kept)",
                        template.name,
                        template.id,
                        self.items.len()
                    );
                    return Ok(template);
                }
                Err(e) if e.is_quota_exceeded() && !kept.is_empty() => {
                    let evicted = kept.remove(0);
                    log::warn!(
                        "save_template: quota exceeded, evicting '{}' ({}) and retrying",
                        evicted.name,
                        evicted.id
                    );
                }
                Err(e) => {
                    log::error!("save_template: '{}' not saved: {e}", template.name);
                    return Err(e);
                }
            }
        }
    }

    /// Remove a template; `false` when no template has that id.
    pub fn delete(&mut self, store: &mut dyn KeyValueStore, id: u64) -> Result<bool> {
        let Some(pos) = self.items.iter().position(|t| t.id == id) else {
            return Ok(false);
        };
        let mut next = self.items.clone();
        let removed = next.remove(pos);
        save_json(store, TEMPLATES_KEY, &next)?;
        self.items = next;
        log::info!("delete_template: removed '{}' ({id})", removed.name);
        Ok(true)
    }
}
