//! Uploaded images grouped by category, persisted under `resources`.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{load_json, save_json, KeyValueStore};
use crate::layers::ImageRef;
use crate::{Error, Result};

pub const RESOURCES_KEY: &str = "resources";

/// Longest filename token kept in templates
const MAX_TOKEN_LEN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Icon,
    Background,
    Character,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 3] = [
        ResourceCategory::Icon,
        ResourceCategory::Background,
        ResourceCategory::Character,
    ];
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceCategory::Icon => "icon",
            ResourceCategory::Background => "background",
            ResourceCategory::Character => "character",
        })
    }
}

impl FromStr for ResourceCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "icon" | "icons" => Ok(ResourceCategory::Icon),
            "background" | "backgrounds" => Ok(ResourceCategory::Background),
            "character" | "characters" => Ok(ResourceCategory::Character),
            other => Err(Error::Validation(format!("unknown resource category '{other}'"))),
        }
    }
}

/// A named image. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Creation time in milliseconds since the epoch, unique within the store
    pub id: u64,
    pub name: String,
    /// Embeddable image, normally a `data:` URI
    pub image: String,
}

impl Resource {
    pub fn image_ref(&self) -> ImageRef {
        ImageRef {
            resource_id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Persisted shape of the `resources` record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ResourceRecords {
    icons: Vec<Resource>,
    backgrounds: Vec<Resource>,
    characters: Vec<Resource>,
}

impl ResourceRecords {
    fn list(&self, category: ResourceCategory) -> &Vec<Resource> {
        match category {
            ResourceCategory::Icon => &self.icons,
            ResourceCategory::Background => &self.backgrounds,
            ResourceCategory::Character => &self.characters,
        }
    }

    fn list_mut(&mut self, category: ResourceCategory) -> &mut Vec<Resource> {
        match category {
            ResourceCategory::Icon => &mut self.icons,
            ResourceCategory::Background => &mut self.backgrounds,
            ResourceCategory::Character => &mut self.characters,
        }
    }

    fn all(&self) -> impl Iterator<Item = (ResourceCategory, &Resource)> {
        ResourceCategory::ALL
            .into_iter()
            .flat_map(move |c| self.list(c).iter().map(move |r| (c, r)))
    }
}

/// In-memory view of the `resources` record, written through on every add.
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    records: ResourceRecords,
}

impl ResourceStore {
    /// Read the record; a missing record is an empty store.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let records = load_json(store, RESOURCES_KEY)?.unwrap_or_default();
        Ok(Self { records })
    }

    /// Validate, assign an id, and persist a new resource.
    pub fn add(
        &mut self,
        store: &mut dyn KeyValueStore,
        category: ResourceCategory,
        name: &str,
        image: &str,
    ) -> Result<Resource> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("resource name is required".into()));
        }
        if image.trim().is_empty() {
            return Err(Error::Validation("resource image is required".into()));
        }

        let resource = Resource {
            id: self.next_id(),
            name: name.to_string(),
            image: image.to_string(),
        };
        let mut next = self.records.clone();
        next.list_mut(category).push(resource.clone());
        save_json(store, RESOURCES_KEY, &next)?;
        self.records = next;
        log::info!("add_resource: {category} '{}' stored as {}", resource.name, resource.id);
        Ok(resource)
    }

    /// Millisecond timestamp, bumped past the newest id so ids stay unique.
    fn next_id(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let newest = self.records.all().map(|(_, r)| r.id).max().unwrap_or(0);
        now.max(newest + 1)
    }

    pub fn list(&self, category: ResourceCategory) -> &[Resource] {
        self.records.list(category)
    }

    pub fn get(&self, id: u64) -> Option<&Resource> {
        self.records.all().map(|(_, r)| r).find(|r| r.id == id)
    }

    pub fn category_of(&self, id: u64) -> Option<ResourceCategory> {
        self.records.all().find(|(_, r)| r.id == id).map(|(c, _)| c)
    }

    /// First resource of `category` whose image contains `token`.
    pub fn find_by_token(&self, category: ResourceCategory, token: &str) -> Option<&Resource> {
        if token.is_empty() {
            return None;
        }
        self.list(category).iter().find(|r| r.image.contains(token))
    }

    pub fn len(&self) -> usize {
        self.records.all().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compact reference to an image: the tail of its last `/`-separated segment.
///
/// Any substring of the image finds it again through
/// [`ResourceStore::find_by_token`].
pub fn filename_token(image: &str) -> String {
    let last = image.rsplit('/').next().unwrap_or(image);
    let skip = last.chars().count().saturating_sub(MAX_TOKEN_LEN);
    last.chars().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn add_validates_and_persists() {
        let mut kv = MemoryStore::new();
        let mut store = ResourceStore::load(&kv).unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.add(&mut kv, ResourceCategory::Icon, "  ", "data:x"),
            Err(Error::Validation(_))
        ));
        assert!(store.add(&mut kv, ResourceCategory::Icon, "star", "").is_err());
        assert_eq!(kv.get(RESOURCES_KEY).unwrap(), None);

        let a = store
            .add(&mut kv, ResourceCategory::Icon, "star", "data:image/png;base64,AAAA")
            .unwrap();
        let b = store
            .add(&mut kv, ResourceCategory::Background, "sky", "data:image/png;base64,BBBB")
            .unwrap();
        assert!(b.id > a.id);

        let reloaded = ResourceStore::load(&kv).unwrap();
        assert_eq!(reloaded.list(ResourceCategory::Icon), &[a.clone()]);
        assert_eq!(reloaded.get(b.id), Some(&b));
        assert_eq!(reloaded.category_of(b.id), Some(ResourceCategory::Background));

        let raw: serde_json::Value =
            serde_json::from_str(&kv.get(RESOURCES_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(raw["icons"][0]["name"], "star");
        assert!(raw["characters"].as_array().unwrap().is_empty());
    }

    #[test]
    fn failed_persist_leaves_store_unchanged() {
        let mut kv = MemoryStore::with_quota(16);
        let mut store = ResourceStore::default();
        let err = store
            .add(&mut kv, ResourceCategory::Icon, "big", "data:image/png;base64,AAAAAAAA")
            .unwrap_err();
        assert!(err.is_quota_exceeded());
        assert!(store.is_empty());
    }

    #[test]
    fn tokens_match_by_containment() {
        let mut kv = MemoryStore::new();
        let mut store = ResourceStore::default();
        let r = store
            .add(&mut kv, ResourceCategory::Character, "hero", "data:image/png;base64,ab/cdEF")
            .unwrap();
        let token = filename_token(&r.image);
        assert_eq!(token, "cdEF");
        assert_eq!(store.find_by_token(ResourceCategory::Character, &token), Some(&r));
        assert_eq!(store.find_by_token(ResourceCategory::Icon, &token), None);
        assert_eq!(store.find_by_token(ResourceCategory::Character, ""), None);

        let long = "x".repeat(100) + "END";
        assert_eq!(filename_token(&long).len(), MAX_TOKEN_LEN);
        assert!(filename_token(&long).ends_with("END"));
    }

    #[test]
    fn category_names_parse() {
        assert_eq!("icons".parse::<ResourceCategory>().unwrap(), ResourceCategory::Icon);
        assert_eq!(
            "Background".parse::<ResourceCategory>().unwrap(),
            ResourceCategory::Background
        );
        assert!("sprite".parse::<ResourceCategory>().is_err());
    }
}
