//! Template codec: compact snapshots of a composition.
//!
//! Images are stored as filename tokens rather than full blobs and are
//! matched back against the live resource store on apply. A token that no
//! longer matches anything drops that one element; the rest of the template
//! still applies.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geometry::{ElementId, GeometryModel, Rect};
use crate::layers::{ImageRef, LayerModel, TextRole};
use crate::rendering::FontBook;
use crate::store::{filename_token, ResourceCategory, ResourceStore};
use crate::style::TextStyle;
use crate::{Result, Viewport};

/// An image element reduced to its token and placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Tail of the image's last path segment
    pub src: String,
    /// Resource name at capture time, for diagnostics only
    #[serde(default)]
    pub name: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEntry {
    pub text: String,
    pub style: TextStyle,
    pub rect: Rect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateData {
    pub background: Option<ImageEntry>,
    /// One entry per icon slot; `None` for an empty slot
    pub icons: Vec<Option<ImageEntry>>,
    pub character: Option<ImageEntry>,
    pub texts: BTreeMap<TextRole, TextEntry>,
}

/// What [`TemplateData::apply`] managed to restore
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub restored: Vec<ElementId>,
    pub skipped: Vec<ElementId>,
}

impl TemplateData {
    /// Snapshot the current composition.
    ///
    /// An element whose resource is gone from the store cannot be tokenized
    /// and is left out.
    pub fn capture(
        layers: &LayerModel,
        geometry: &GeometryModel,
        resources: &ResourceStore,
    ) -> TemplateData {
        let image_entry = |id: ElementId| -> Option<ImageEntry> {
            let element = layers.element(id)?;
            let image = element.image()?;
            let rect = geometry.get_rect(id)?;
            match resources.get(image.resource_id) {
                Some(resource) => Some(ImageEntry {
                    src: filename_token(&resource.image),
                    name: resource.name.clone(),
                    rect,
                }),
                None => {
                    log::warn!(
                        "capture_template: {id} refers to missing resource {}",
                        image.resource_id
                    );
                    None
                }
            }
        };

        let mut texts = BTreeMap::new();
        for role in TextRole::ALL {
            let id = ElementId::Text(role);
            let (Some(content), Some(rect)) = (
                layers.element(id).and_then(|e| e.text()),
                geometry.get_rect(id),
            ) else {
                continue;
            };
            texts.insert(
                role,
                TextEntry {
                    text: content.text.clone(),
                    style: content.style.clone(),
                    rect,
                },
            );
        }

        TemplateData {
            background: image_entry(ElementId::Background),
            icons: (0..layers.icon_count())
                .map(|i| image_entry(ElementId::Icon(i)))
                .collect(),
            character: image_entry(ElementId::Character),
            texts,
        }
    }

    /// Clear the composition and rebuild it from this snapshot.
    ///
    /// Rects are written before the element is re-created so stored
    /// placements win over defaults. An element whose stored data is
    /// rejected is skipped; the others are still restored. Each text element waits for its font
    /// family before its style is applied; a font that fails or times out
    /// is logged and the fallback face is used.
    pub async fn apply(
        &self,
        layers: &mut LayerModel,
        geometry: &mut GeometryModel,
        viewport: &Viewport,
        resources: &ResourceStore,
        fonts: &FontBook,
        font_timeout: Duration,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        layers.clear();

        let resolve = |category: ResourceCategory, entry: &ImageEntry| -> Option<ImageRef> {
            resources
                .find_by_token(category, &entry.src)
                .map(|r| r.image_ref())
        };

        if let Some(entry) = &self.background {
            match resolve(ResourceCategory::Background, entry) {
                Some(image) => {
                    let result = layers.set_background(Some(image), geometry, viewport);
                    settle(&mut report, ElementId::Background, result);
                }
                None => skip(&mut report, ElementId::Background, entry),
            }
        }

        if let Some(entry) = &self.character {
            match resolve(ResourceCategory::Character, entry) {
                Some(image) => {
                    let result = geometry
                        .set_rect(ElementId::Character, entry.rect)
                        .and_then(|()| layers.set_character(Some(image), geometry, viewport));
                    settle(&mut report, ElementId::Character, result);
                }
                None => skip(&mut report, ElementId::Character, entry),
            }
        }

        let (min_icons, max_icons) = layers.icon_bounds();
        let count = self.icons.len().clamp(min_icons, max_icons);
        if count != self.icons.len() {
            log::warn!(
                "apply_template: {} icon slots adjusted to {count}",
                self.icons.len()
            );
        }
        layers.set_icon_count(count)?;
        for (index, entry) in self.icons.iter().take(count).enumerate() {
            let Some(entry) = entry else { continue };
            let id = ElementId::Icon(index);
            match resolve(ResourceCategory::Icon, entry) {
                Some(image) => {
                    let result = geometry
                        .set_rect(id, entry.rect)
                        .and_then(|()| layers.set_icon(index, Some(image), geometry));
                    settle(&mut report, id, result);
                }
                None => skip(&mut report, id, entry),
            }
        }

        for (role, entry) in &self.texts {
            let family = &entry.style.font_family;
            if let Err(e) = fonts.wait(family, font_timeout).await {
                log::warn!("apply_template: font '{family}' for {role}: {e}; using fallback");
            }
            let id = ElementId::Text(*role);
            let result = geometry.set_rect(id, entry.rect).and_then(|()| {
                layers.set_text(*role, entry.text.clone(), entry.style.clone(), geometry, viewport)
            });
            settle(&mut report, id, result);
        }

        log::info!(
            "apply_template: restored {} elements, skipped {}",
            report.restored.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

fn settle(report: &mut ApplyReport, id: ElementId, result: Result<()>) {
    match result {
        Ok(()) => report.restored.push(id),
        Err(e) => {
            log::warn!("apply_template: {id} rejected: {e}, skipped");
            report.skipped.push(id);
        }
    }
}

fn skip(report: &mut ApplyReport, id: ElementId, entry: &ImageEntry) {
    log::warn!(
        "apply_template: no resource matches '{}' ({}) for {id}, skipped",
        entry.src,
        entry.name
    );
    report.skipped.push(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::style::Color;

    struct Fixture {
        layers: LayerModel,
        geometry: GeometryModel,
        viewport: Viewport,
        resources: ResourceStore,
        kv: MemoryStore,
    }

    fn fixture() -> Fixture {
        Fixture {
            layers: LayerModel::new(2, 6),
            geometry: GeometryModel::new(),
            viewport: Viewport::new(800.0, 450.0),
            resources: ResourceStore::default(),
            kv: MemoryStore::new(),
        }
    }

    #[tokio::test]
    async fn capture_then_apply_restores_composition() {
        let mut f = fixture();
        let bg = f
            .resources
            .add(&mut f.kv, ResourceCategory::Background, "sky", "data:image/png;base64,sky/SKY1")
            .unwrap();
        let icon = f
            .resources
            .add(&mut f.kv, ResourceCategory::Icon, "star", "data:image/png;base64,ic/STAR")
            .unwrap();
        let hero = f
            .resources
            .add(&mut f.kv, ResourceCategory::Character, "hero", "data:image/png;base64,h/HERO")
            .unwrap();

        f.layers
            .set_background(Some(bg.image_ref()), &mut f.geometry, &f.viewport)
            .unwrap();
        f.layers.set_icon_count(3).unwrap();
        f.layers.set_icon(2, Some(icon.image_ref()), &mut f.geometry).unwrap();
        f.geometry
            .set_rect(ElementId::Icon(2), Rect::new(300.0, 10.0, 80.0, 80.0))
            .unwrap();
        f.layers
            .set_character(Some(hero.image_ref()), &mut f.geometry, &f.viewport)
            .unwrap();
        let mut style = TextStyle::for_role(TextRole::Title);
        style.color = Color::rgb(255, 0, 0);
        style.stroke_width = 2.0;
        f.layers
            .set_text(TextRole::Title, "Hello", style.clone(), &mut f.geometry, &f.viewport)
            .unwrap();

        let data = TemplateData::capture(&f.layers, &f.geometry, &f.resources);
        assert_eq!(data.icons.len(), 3);
        assert!(data.icons[0].is_none());
        assert_eq!(data.icons[2].as_ref().unwrap().src, "STAR");

        // serialized form survives a round trip through JSON
        let json = serde_json::to_string(&data).unwrap();
        let data: TemplateData = serde_json::from_str(&json).unwrap();

        let mut g = GeometryModel::new();
        let mut l = LayerModel::new(2, 6);
        let report = data
            .apply(&mut l, &mut g, &f.viewport, &f.resources, &FontBook::new(), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(l.icon_count(), 3);
        assert_eq!(l.element(ElementId::Icon(2)).unwrap().image(), Some(&icon.image_ref()));
        assert_eq!(
            g.get_rect(ElementId::Icon(2)),
            Some(Rect::new(300.0, 10.0, 80.0, 80.0))
        );
        assert_eq!(l.element(ElementId::Background).unwrap().image(), Some(&bg.image_ref()));
        assert_eq!(
            g.get_rect(ElementId::Character),
            f.geometry.get_rect(ElementId::Character)
        );
        let title = l.element(ElementId::Text(TextRole::Title)).unwrap().text().unwrap();
        assert_eq!(title.text, "Hello");
        assert_eq!(title.style, style);
    }

    #[tokio::test]
    async fn unmatched_tokens_are_skipped() {
        let mut f = fixture();
        let data = TemplateData {
            character: Some(ImageEntry {
                src: "GONE".into(),
                name: "ghost".into(),
                rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            }),
            icons: vec![None, None],
            ..Default::default()
        };
        let report = data
            .apply(
                &mut f.layers,
                &mut f.geometry,
                &f.viewport,
                &f.resources,
                &FontBook::new(),
                Duration::from_millis(50),
            )
            .await
            .unwrap();
        assert_eq!(report.skipped, vec![ElementId::Character]);
        assert!(f.layers.elements().is_empty());
    }

    #[tokio::test]
    async fn rejected_element_does_not_stop_the_rest() {
        let mut f = fixture();
        let hero = f
            .resources
            .add(&mut f.kv, ResourceCategory::Character, "hero", "data:h/HERO")
            .unwrap();
        let icon = f
            .resources
            .add(&mut f.kv, ResourceCategory::Icon, "star", "data:a/STAR")
            .unwrap();
        let mut texts = BTreeMap::new();
        texts.insert(
            TextRole::Title,
            TextEntry {
                text: "Still here".into(),
                style: TextStyle::for_role(TextRole::Title),
                rect: Rect::new(80.0, 135.0, 640.0, 43.0),
            },
        );
        let data = TemplateData {
            character: Some(ImageEntry {
                src: "HERO".into(),
                name: hero.name.clone(),
                rect: Rect::new(0.0, 0.0, -5.0, 10.0),
            }),
            icons: vec![
                Some(ImageEntry {
                    src: "STAR".into(),
                    name: icon.name.clone(),
                    rect: Rect::new(40.0, 40.0, 60.0, 60.0),
                }),
                None,
            ],
            texts,
            ..Default::default()
        };

        let report = data
            .apply(
                &mut f.layers,
                &mut f.geometry,
                &f.viewport,
                &f.resources,
                &FontBook::new(),
                Duration::from_millis(50),
            )
            .await
            .unwrap();
        assert_eq!(report.skipped, vec![ElementId::Character]);
        assert_eq!(
            report.restored,
            vec![ElementId::Icon(0), ElementId::Text(TextRole::Title)]
        );
        assert!(f.layers.element(ElementId::Character).is_none());
        assert_eq!(
            f.geometry.get_rect(ElementId::Icon(0)),
            Some(Rect::new(40.0, 40.0, 60.0, 60.0))
        );
        let title = f.layers.element(ElementId::Text(TextRole::Title)).unwrap();
        assert_eq!(title.text().unwrap().text, "Still here");
    }

    #[tokio::test]
    async fn apply_clears_previous_composition() {
        let mut f = fixture();
        let icon = f
            .resources
            .add(&mut f.kv, ResourceCategory::Icon, "star", "data:a/STAR")
            .unwrap();
        f.layers.set_icons(vec![Some(icon.image_ref()); 4], 4, &mut f.geometry).unwrap();

        let report = TemplateData::default()
            .apply(
                &mut f.layers,
                &mut f.geometry,
                &f.viewport,
                &f.resources,
                &FontBook::new(),
                Duration::from_millis(50),
            )
            .await
            .unwrap();
        assert!(report.restored.is_empty());
        assert_eq!(f.layers.icon_count(), 2);
        assert!(f.layers.elements().is_empty());
    }
}
