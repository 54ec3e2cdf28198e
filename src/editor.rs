//! The editor facade: one composition, its stores, and the export path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::export::FileExporter;
use crate::geometry::{ElementId, GeometryChange, GeometryModel, ListenerId, Rect, Size};
use crate::gesture::{GestureController, GestureOutcome};
use crate::input::PointerEvent;
use crate::layers::{ElementContent, ImageRef, LayerModel, TextRole};
use crate::rendering::{
    Bitmap, Compositor, DecodeCache, FontBook, ImageSource, RenderContent, RenderElement,
};
use crate::store::{KeyValueStore, Resource, ResourceCategory, ResourceStore, Template, TemplateStore};
use crate::style::TextStyle;
use crate::template::{ApplyReport, TemplateData};
use crate::{EditorConfig, Error, Result, Viewport};

/// Log a failed operation with its name and pass the result through.
fn logged<T>(op: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        log::error!("{op}: {e}");
    }
    result
}

/// A single editing session.
///
/// Owns the composition (layer and geometry models plus gesture state),
/// the resource and template stores with their backing key-value store,
/// and the compositor's decode cache and font book.
pub struct Editor {
    config: EditorConfig,
    viewport: Viewport,
    store: Box<dyn KeyValueStore>,
    resources: ResourceStore,
    templates: TemplateStore,
    layers: LayerModel,
    geometry: GeometryModel,
    gestures: GestureController,
    compositor: Compositor,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("config", &self.config)
            .field("viewport", &self.viewport)
            .field("resources", &self.resources.len())
            .field("templates", &self.templates.len())
            .field("layers", &self.layers)
            .finish()
    }
}

impl Editor {
    /// Open an editor over `store`, reading the persisted records.
    pub fn new(
        config: EditorConfig,
        viewport: Viewport,
        store: impl KeyValueStore + 'static,
    ) -> Result<Self> {
        let store: Box<dyn KeyValueStore> = Box::new(store);
        let resources = logged("load_resources", ResourceStore::load(store.as_ref()))?;
        let templates = logged(
            "load_templates",
            TemplateStore::load(store.as_ref(), config.max_templates),
        )?;

        let mut geometry = GeometryModel::new();
        geometry.subscribe(|change: &GeometryChange| {
            log::trace!(
                "geometry: {} -> {}x{} at ({}, {})",
                change.id,
                change.current.width,
                change.current.height,
                change.current.left,
                change.current.top
            );
        });

        let compositor = Compositor::new(DecodeCache::new(), FontBook::new())
            .with_max_pixels(config.max_target_pixels);
        log::info!(
            "editor: {} resources, {} templates, target {}",
            resources.len(),
            templates.len(),
            config.aspect_ratio
        );

        Ok(Self {
            layers: LayerModel::new(config.min_icons, config.max_icons),
            gestures: GestureController::new(config.resize_limits(), config.handle_size),
            config,
            viewport,
            store,
            resources,
            templates,
            geometry,
            compositor,
        })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Track the surface after a window resize. The background keeps
    /// covering the whole surface; other rects are left where they are.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.viewport = viewport;
        if self.layers.element(ElementId::Background).is_some() {
            self.geometry.set_rect(
                ElementId::Background,
                Rect::new(0.0, 0.0, viewport.width, viewport.height),
            )?;
        }
        Ok(())
    }

    pub fn layers(&self) -> &LayerModel {
        &self.layers
    }

    pub fn geometry(&self) -> &GeometryModel {
        &self.geometry
    }

    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    pub fn templates(&self) -> &[Template] {
        self.templates.list()
    }

    pub fn fonts(&self) -> &FontBook {
        self.compositor.fonts()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Register a listener for every geometry change.
    pub fn on_geometry_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&GeometryChange) + 'static,
    {
        self.geometry.subscribe(listener)
    }

    /// Move or resize an element directly.
    pub fn set_rect(&mut self, id: ElementId, rect: Rect) -> Result<()> {
        logged("set_rect", self.geometry.set_rect(id, rect))
    }

    // resources

    pub fn add_resource(
        &mut self,
        category: ResourceCategory,
        name: &str,
        image: &str,
    ) -> Result<Resource> {
        let resource = logged(
            "add_resource",
            self.resources
                .add(self.store.as_mut(), category, name, image),
        )?;
        Ok(resource)
    }

    /// Read an image file and store it as a resource.
    pub async fn import_resource(
        &mut self,
        category: ResourceCategory,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<Resource> {
        let image = logged(
            "import_resource",
            crate::ingest::file_to_embeddable_image(path).await,
        )?;
        self.add_resource(category, name, &image)
    }

    fn image_ref(&self, category: ResourceCategory, id: u64) -> Result<ImageRef> {
        let resource = self
            .resources
            .get(id)
            .ok_or_else(|| Error::ResourceNotFound(format!("resource {id}")))?;
        match self.resources.category_of(id) {
            Some(c) if c == category => Ok(resource.image_ref()),
            other => Err(Error::Validation(format!(
                "resource {id} is a {} not a {category}",
                other.map(|c| c.to_string()).unwrap_or_default()
            ))),
        }
    }

    fn resolve_optional(&self, category: ResourceCategory, id: Option<u64>) -> Result<Option<ImageRef>> {
        id.map(|id| self.image_ref(category, id)).transpose()
    }

    /// Bring selection and decode cache in line with the composition:
    /// a removed element cannot stay selected, and only images still on
    /// the canvas keep their decoded pixels.
    fn sync_composition(&mut self) {
        self.gestures.drop_stale_selection(&self.layers);
        let referenced: HashSet<u64> = self
            .layers
            .elements()
            .into_iter()
            .filter_map(|e| e.image().map(|r| r.resource_id))
            .collect();
        let evicted = self.compositor.images().retain(|id| referenced.contains(&id));
        if evicted > 0 {
            log::debug!("decode: released {evicted} images no longer in the composition");
        }
    }

    fn prefetch(&self, image: Option<&ImageRef>) {
        if let Some(resource) = image.and_then(|r| self.resources.get(r.resource_id)) {
            self.compositor
                .images()
                .prefetch(&ImageSource::new(resource.id, resource.image.as_str()));
        }
    }

    // layers

    pub fn set_background(&mut self, resource: Option<u64>) -> Result<()> {
        let image = logged(
            "set_background",
            self.resolve_optional(ResourceCategory::Background, resource),
        )?;
        self.prefetch(image.as_ref());
        let result = self
            .layers
            .set_background(image, &mut self.geometry, &self.viewport);
        self.sync_composition();
        logged("set_background", result)
    }

    pub fn set_character(&mut self, resource: Option<u64>) -> Result<()> {
        let image = logged(
            "set_character",
            self.resolve_optional(ResourceCategory::Character, resource),
        )?;
        self.prefetch(image.as_ref());
        let result = self
            .layers
            .set_character(image, &mut self.geometry, &self.viewport);
        self.sync_composition();
        logged("set_character", result)
    }

    pub fn set_icon_count(&mut self, count: usize) -> Result<()> {
        let result = self.layers.set_icon_count(count);
        self.sync_composition();
        logged("set_icon_count", result)
    }

    pub fn set_icon(&mut self, index: usize, resource: Option<u64>) -> Result<()> {
        let image = logged(
            "set_icon",
            self.resolve_optional(ResourceCategory::Icon, resource),
        )?;
        self.prefetch(image.as_ref());
        let result = self.layers.set_icon(index, image, &mut self.geometry);
        self.sync_composition();
        logged("set_icon", result)
    }

    /// Set the icon count and fill the slots in order.
    pub fn set_icons(&mut self, resources: &[Option<u64>], count: usize) -> Result<()> {
        let images = logged(
            "set_icons",
            resources
                .iter()
                .map(|id| self.resolve_optional(ResourceCategory::Icon, *id))
                .collect::<Result<Vec<_>>>(),
        )?;
        for image in &images {
            self.prefetch(image.as_ref());
        }
        let result = self.layers.set_icons(images, count, &mut self.geometry);
        self.sync_composition();
        logged("set_icons", result)
    }

    pub fn set_text(&mut self, role: TextRole, text: &str, style: TextStyle) -> Result<()> {
        logged(
            "set_text",
            self.layers
                .set_text(role, text, style, &mut self.geometry, &self.viewport),
        )
    }

    pub fn remove_text(&mut self, role: TextRole) -> bool {
        let removed = self.layers.remove_text(role).is_some();
        self.sync_composition();
        removed
    }

    /// Empty the composition. Icon slots go back to the minimum count.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.gestures.select(None);
        self.sync_composition();
    }

    // gestures

    pub fn selected(&self) -> Option<ElementId> {
        self.gestures.selected()
    }

    pub fn select(&mut self, id: Option<ElementId>) {
        self.gestures.select(id);
    }

    /// Route one pointer event (client coordinates) to the gesture machines.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> Result<GestureOutcome> {
        logged(
            "pointer",
            self.gestures.handle(
                event,
                &self.viewport,
                &mut self.layers,
                &mut self.geometry,
            ),
        )
    }

    // rendering

    /// Current composition as compositor input, in paint order.
    pub fn render_elements(&self) -> Vec<RenderElement> {
        self.layers
            .elements()
            .into_iter()
            .filter_map(|element| {
                let rect = self.geometry.get_rect(element.id)?;
                let content = match &element.content {
                    ElementContent::Text(t) => Some(RenderContent::Text(t.clone())),
                    ElementContent::Image(r) => match self.resources.get(r.resource_id) {
                        Some(res) => Some(RenderContent::Image(ImageSource::new(
                            res.id,
                            res.image.as_str(),
                        ))),
                        None => {
                            log::warn!(
                                "render: {} refers to missing resource {}",
                                element.id,
                                r.resource_id
                            );
                            None
                        }
                    },
                };
                Some(RenderElement {
                    id: element.id,
                    layer: element.layer,
                    rect,
                    content,
                })
            })
            .collect()
    }

    /// Render the composition at an arbitrary target size.
    pub async fn render(&self, target: Size) -> Result<Bitmap> {
        let elements = self.render_elements();
        let result = self
            .compositor
            .render(target, self.viewport.width, self.viewport.height, &elements)
            .await;
        logged("render", result)
    }

    /// Render at the configured export size.
    pub async fn render_export(&self) -> Result<Bitmap> {
        self.render(self.config.target_size()).await
    }

    pub async fn export_png(&self) -> Result<Vec<u8>> {
        let bitmap = self.render_export().await?;
        logged("export_png", bitmap.to_png())
    }

    /// Render and write the export to `path`; returns the bytes written.
    pub async fn export_to(&self, path: impl Into<PathBuf>) -> Result<usize> {
        let bitmap = self.render_export().await?;
        logged("export", FileExporter::new(path).write(&bitmap).await)
    }

    /// Template preview: the composition at thumbnail size as a JPEG data URI.
    pub async fn thumbnail(&self) -> Result<String> {
        let bitmap = self.render(self.config.thumbnail_size()).await?;
        logged(
            "thumbnail",
            bitmap.to_jpeg_data_uri(self.config.thumbnail_quality),
        )
    }

    // templates

    pub fn capture(&self) -> TemplateData {
        TemplateData::capture(&self.layers, &self.geometry, &self.resources)
    }

    pub async fn save_template(&mut self, name: &str) -> Result<Template> {
        if name.trim().is_empty() {
            return logged(
                "save_template",
                Err(Error::Validation("template name is required".into())),
            );
        }
        let preview = self.thumbnail().await?;
        let data = self.capture();
        logged(
            "save_template",
            self.templates
                .save(self.store.as_mut(), name, preview, data),
        )
    }

    /// Replace the composition with a stored template.
    pub async fn load_template(&mut self, id: u64) -> Result<ApplyReport> {
        let data = match self.templates.get(id) {
            Some(t) => t.data.clone(),
            None => {
                return logged(
                    "load_template",
                    Err(Error::Validation(format!("no template with id {id}"))),
                )
            }
        };
        self.gestures.select(None);
        let result = data
            .apply(
                &mut self.layers,
                &mut self.geometry,
                &self.viewport,
                &self.resources,
                self.compositor.fonts(),
                Duration::from_millis(self.config.font_load_timeout_ms),
            )
            .await;
        self.sync_composition();
        logged("load_template", result)
    }

    pub fn delete_template(&mut self, id: u64) -> Result<bool> {
        logged(
            "delete_template",
            self.templates.delete(self.store.as_mut(), id),
        )
    }
}
