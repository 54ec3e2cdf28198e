//! Layer model: element identity and content, grouped by layer kind.
//!
//! Rects are not stored here; the [`GeometryModel`] owns them. When an
//! element is created without a stored rect the layer model seeds a default
//! placement into the geometry model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{ElementId, GeometryModel, Rect};
use crate::style::TextStyle;
use crate::{Error, Result, Viewport};

/// Line height multiplier used for the default height of text boxes
pub const TEXT_LINE_HEIGHT: f64 = 1.2;

/// Layer kinds in paint order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Background,
    Character,
    Icon,
    Text,
}

impl LayerKind {
    pub const Z_ORDER: [LayerKind; 4] = [
        LayerKind::Background,
        LayerKind::Character,
        LayerKind::Icon,
        LayerKind::Text,
    ];

    pub fn z_index(self) -> u8 {
        match self {
            LayerKind::Background => 1,
            LayerKind::Character => 2,
            LayerKind::Icon => 3,
            LayerKind::Text => 4,
        }
    }
}

/// Fixed roles for text elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextRole {
    Title,
    Subtitle,
}

impl TextRole {
    pub const ALL: [TextRole; 2] = [TextRole::Title, TextRole::Subtitle];

    pub fn default_font_size(self) -> f64 {
        match self {
            TextRole::Title => 36.0,
            TextRole::Subtitle => 24.0,
        }
    }

    fn default_top_fraction(self) -> f64 {
        match self {
            TextRole::Title => 0.30,
            TextRole::Subtitle => 0.45,
        }
    }

    fn default_width_fraction(self) -> f64 {
        match self {
            TextRole::Title => 0.80,
            TextRole::Subtitle => 0.60,
        }
    }

    /// Placement used when a text element is created without a stored rect.
    pub fn default_rect(self, viewport: &Viewport, font_size: f64) -> Rect {
        let width = viewport.width * self.default_width_fraction();
        Rect::new(
            (viewport.width - width) / 2.0,
            viewport.height * self.default_top_fraction(),
            width,
            font_size * TEXT_LINE_HEIGHT,
        )
    }
}

impl fmt::Display for TextRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextRole::Title => write!(f, "title"),
            TextRole::Subtitle => write!(f, "subtitle"),
        }
    }
}

impl TextStyle {
    /// Default style for a role (title 36px, subtitle 24px).
    pub fn for_role(role: TextRole) -> Self {
        Self {
            size: role.default_font_size(),
            ..Self::default()
        }
    }
}

/// Weak reference to an entry of the resource store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub resource_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub style: TextStyle,
}

/// What an element paints
#[derive(Debug, Clone, PartialEq)]
pub enum ElementContent {
    Image(ImageRef),
    Text(TextContent),
}

/// Width and font size captured the first time a text element is resized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeBaseline {
    pub width: f64,
    pub font_size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub layer: LayerKind,
    pub content: ElementContent,
    baseline: Option<ResizeBaseline>,
}

impl Element {
    fn new(id: ElementId, layer: LayerKind, content: ElementContent) -> Self {
        Self {
            id,
            layer,
            content,
            baseline: None,
        }
    }

    pub fn z_index(&self) -> u8 {
        self.layer.z_index()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.content, ElementContent::Text(_))
    }

    pub fn image(&self) -> Option<&ImageRef> {
        match &self.content {
            ElementContent::Image(r) => Some(r),
            ElementContent::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&TextContent> {
        match &self.content {
            ElementContent::Text(t) => Some(t),
            ElementContent::Image(_) => None,
        }
    }

    pub fn resize_baseline(&self) -> Option<ResizeBaseline> {
        self.baseline
    }
}

/// Active elements per layer.
#[derive(Debug, Clone)]
pub struct LayerModel {
    background: Option<Element>,
    character: Option<Element>,
    icons: Vec<Option<Element>>,
    texts: BTreeMap<TextRole, Element>,
    min_icons: usize,
    max_icons: usize,
}

impl LayerModel {
    pub fn new(min_icons: usize, max_icons: usize) -> Self {
        Self {
            background: None,
            character: None,
            icons: vec![None; min_icons],
            texts: BTreeMap::new(),
            min_icons,
            max_icons: max_icons.max(min_icons),
        }
    }

    pub fn set_background(
        &mut self,
        image: Option<ImageRef>,
        geometry: &mut GeometryModel,
        viewport: &Viewport,
    ) -> Result<()> {
        match image {
            Some(image) => {
                geometry.set_rect(
                    ElementId::Background,
                    Rect::new(0.0, 0.0, viewport.width, viewport.height),
                )?;
                self.background = Some(Element::new(
                    ElementId::Background,
                    LayerKind::Background,
                    ElementContent::Image(image),
                ));
            }
            None => self.background = None,
        }
        Ok(())
    }

    pub fn set_character(
        &mut self,
        image: Option<ImageRef>,
        geometry: &mut GeometryModel,
        viewport: &Viewport,
    ) -> Result<()> {
        match image {
            Some(image) => {
                if !geometry.contains(ElementId::Character) {
                    let side = 300.0;
                    geometry.set_rect(
                        ElementId::Character,
                        Rect::new(
                            (viewport.width - side) / 2.0,
                            (viewport.height - side) / 2.0,
                            side,
                            side,
                        ),
                    )?;
                }
                self.character = Some(Element::new(
                    ElementId::Character,
                    LayerKind::Character,
                    ElementContent::Image(image),
                ));
            }
            None => self.character = None,
        }
        Ok(())
    }

    pub fn icon_count(&self) -> usize {
        self.icons.len()
    }

    /// Allowed `(min, max)` icon slot counts.
    pub fn icon_bounds(&self) -> (usize, usize) {
        (self.min_icons, self.max_icons)
    }

    /// Resize the active icon slot set. Slots below `count` keep their content.
    pub fn set_icon_count(&mut self, count: usize) -> Result<()> {
        if count < self.min_icons || count > self.max_icons {
            return Err(Error::Validation(format!(
                "icon count {count} outside {}..={}",
                self.min_icons, self.max_icons
            )));
        }
        self.icons.resize(count, None);
        Ok(())
    }

    /// Fill (or empty) one icon slot. A slot that was used before keeps its
    /// stored rect; a fresh slot gets the default row placement.
    pub fn set_icon(
        &mut self,
        index: usize,
        image: Option<ImageRef>,
        geometry: &mut GeometryModel,
    ) -> Result<()> {
        if index >= self.icons.len() {
            return Err(Error::Validation(format!(
                "icon slot {index} not active (count {})",
                self.icons.len()
            )));
        }
        let id = ElementId::Icon(index);
        self.icons[index] = match image {
            Some(image) => {
                if !geometry.contains(id) {
                    geometry.set_rect(id, default_icon_rect(index))?;
                }
                Some(Element::new(id, LayerKind::Icon, ElementContent::Image(image)))
            }
            None => None,
        };
        Ok(())
    }

    /// Set the icon count and populate slots from `list` (slot `i` = `list[i]`).
    pub fn set_icons(
        &mut self,
        list: Vec<Option<ImageRef>>,
        count: usize,
        geometry: &mut GeometryModel,
    ) -> Result<()> {
        if list.len() > count {
            return Err(Error::Validation(format!(
                "{} icons given for {count} slots",
                list.len()
            )));
        }
        self.set_icon_count(count)?;
        for index in 0..count {
            let image = list.get(index).cloned().flatten();
            self.set_icon(index, image, geometry)?;
        }
        Ok(())
    }

    /// Replace the element for `role`, creating it with role defaults if absent.
    ///
    /// A changed font size discards the cached resize baseline so the next
    /// resize scales from the size the user picked.
    pub fn set_text(
        &mut self,
        role: TextRole,
        text: impl Into<String>,
        style: TextStyle,
        geometry: &mut GeometryModel,
        viewport: &Viewport,
    ) -> Result<()> {
        let id = ElementId::Text(role);
        if !geometry.contains(id) {
            geometry.set_rect(id, role.default_rect(viewport, style.size))?;
        }

        let content = TextContent {
            text: text.into(),
            style,
        };
        match self.texts.get_mut(&role) {
            Some(existing) => {
                let size_changed = existing
                    .text()
                    .map(|t| t.style.size != content.style.size)
                    .unwrap_or(true);
                if size_changed {
                    existing.baseline = None;
                }
                existing.content = ElementContent::Text(content);
            }
            None => {
                self.texts.insert(
                    role,
                    Element::new(id, LayerKind::Text, ElementContent::Text(content)),
                );
            }
        }
        Ok(())
    }

    pub fn remove_text(&mut self, role: TextRole) -> Option<Element> {
        self.texts.remove(&role)
    }

    /// Font size written by the resize controller; the baseline is kept.
    pub fn set_font_size(&mut self, role: TextRole, size: f64) -> Result<()> {
        let element = self
            .texts
            .get_mut(&role)
            .ok_or_else(|| Error::Validation(format!("no {role} element")))?;
        if let ElementContent::Text(t) = &mut element.content {
            t.style.size = size;
        }
        Ok(())
    }

    /// Return the cached baseline for a text element, capturing it from
    /// `width` and the current font size on first use.
    pub fn capture_baseline(&mut self, role: TextRole, width: f64) -> Option<ResizeBaseline> {
        let element = self.texts.get_mut(&role)?;
        if element.baseline.is_none() {
            let font_size = element.text()?.style.size;
            element.baseline = Some(ResizeBaseline { width, font_size });
        }
        element.baseline
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        match id {
            ElementId::Background => self.background.as_ref(),
            ElementId::Character => self.character.as_ref(),
            ElementId::Icon(i) => self.icons.get(i).and_then(Option::as_ref),
            ElementId::Text(role) => self.texts.get(&role),
        }
    }

    pub fn icons(&self) -> impl Iterator<Item = &Element> {
        self.icons.iter().flatten()
    }

    /// All active elements in paint order: background, character, icons by
    /// slot, then title and subtitle.
    pub fn elements(&self) -> Vec<&Element> {
        let mut out: Vec<&Element> = Vec::new();
        out.extend(self.background.as_ref());
        out.extend(self.character.as_ref());
        out.extend(self.icons());
        out.extend(self.texts.values());
        out
    }

    /// Drop every element and reset the icon count to the minimum.
    ///
    /// Stored rects in the geometry model are left alone so re-populated
    /// slots come back where the user left them.
    pub fn clear(&mut self) {
        self.background = None;
        self.character = None;
        self.icons = vec![None; self.min_icons];
        self.texts.clear();
    }
}

/// Default row placement for icon slot `index`.
pub fn default_icon_rect(index: usize) -> Rect {
    Rect::new(20.0 + index as f64 * 120.0, 20.0, 100.0, 100.0)
}
