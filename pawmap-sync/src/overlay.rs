//! Marker overlay lifecycle
//!
//! [`OverlayRenderer`] turns the cached entity list plus the current selection
//! into marker descriptors and draws them through a [`MapLayer`]. Every render
//! removes all previously drawn markers first; no diffing. Image fallback and
//! click handling are declared on the descriptor and reported back by the
//! layer, never computed upfront.

use std::collections::HashMap;

use pawmap_api::{Entity, EntityCategory, EntityId, EntityStatus, Position, SearchRadius};

const MIN_ZOOM_SCALE: f64 = 0.6;
const MAX_ZOOM_SCALE: f64 = 1.6;

/// Marker scale for a zoom level: `reference / zoom`, clamped to [0.6, 1.6]
pub fn zoom_scale(reference_zoom: f64, zoom_level: f64) -> f64 {
    if !(zoom_level.is_finite() && zoom_level > 0.0) {
        return 1.0;
    }
    (reference_zoom / zoom_level).clamp(MIN_ZOOM_SCALE, MAX_ZOOM_SCALE)
}

/// Action a layer reports back for a marker interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerAction {
    /// Select the entity (marker click)
    Select(EntityId),
    /// Replace the image with this label (image failed to load)
    ShowFallback(String),
}

/// Declarative description of one marker
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDescriptor {
    pub entity_id: EntityId,
    pub category: EntityCategory,
    pub status: EntityStatus,
    pub position: Position,
    pub image_url: Option<String>,
    /// Base size before zoom scaling
    pub size_px: u32,
    pub border_px: u32,
    /// Caption shown under the marker; selected markers only
    pub label: Option<String>,
    pub selected: bool,
    pub scale: f64,
    pub on_click: MarkerAction,
    pub on_image_error: MarkerAction,
}

impl MarkerDescriptor {
    /// Describe `entity`, weighted by whether it is the selection
    pub fn for_entity(entity: &Entity, selected: bool, scale: f64) -> Self {
        let fallback = entity.fallback_label();
        let (size_px, border_px) = if selected { (56, 4) } else { (40, 2) };

        Self {
            entity_id: entity.id,
            category: entity.category,
            status: entity.status,
            position: entity.position,
            image_url: entity.image_url.clone(),
            size_px,
            border_px,
            label: selected.then(|| fallback.clone()),
            selected,
            scale,
            on_click: MarkerAction::Select(entity.id),
            on_image_error: MarkerAction::ShowFallback(fallback),
        }
    }
}

/// Owning handle to one drawn marker. Not `Clone`: exactly one owner.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MarkerHandle(u64);

impl MarkerHandle {
    /// Mint a handle. Only map layers should call this.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Rendering surface of one page
pub trait MapLayer: Send {
    fn add_marker(&mut self, descriptor: &MarkerDescriptor) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn resize_marker(&mut self, handle: &MarkerHandle, scale: f64);
    fn show_fallback(&mut self, handle: &MarkerHandle, label: &str);

    /// Draw or move the single search circle
    fn set_search_circle(&mut self, center: Position, radius_km: f64);
    fn clear_search_circle(&mut self);

    /// Draw or move the single center marker
    fn set_center_marker(&mut self, center: Position);
    fn clear_center_marker(&mut self);

    /// Map provider credentials, set once on mount when configured
    fn set_provider_key(&mut self, _key: &str) {}
}

struct RenderedMarker {
    handle: MarkerHandle,
    entity_id: EntityId,
    fallback: String,
}

/// Sole owner of the markers on a page
pub struct OverlayRenderer {
    rendered: Vec<RenderedMarker>,
    reference_zoom: f64,
    scale: f64,
}

impl OverlayRenderer {
    pub fn new(reference_zoom: f64) -> Self {
        Self {
            rendered: Vec::new(),
            reference_zoom,
            scale: 1.0,
        }
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_rendered(&self, id: EntityId) -> bool {
        self.rendered.iter().any(|m| m.entity_id == id)
    }

    /// Redraw from scratch. Returns the descriptors that were drawn.
    pub fn render<L: MapLayer + ?Sized>(
        &mut self,
        layer: &mut L,
        entities: &[Entity],
        selection: Option<EntityId>,
        radius: SearchRadius,
    ) -> Vec<MarkerDescriptor> {
        self.remove_all(layer);

        let descriptors: Vec<MarkerDescriptor> = entities
            .iter()
            .filter(|e| e.distance_km.is_some_and(|d| radius.contains_km(d)))
            .map(|e| MarkerDescriptor::for_entity(e, selection == Some(e.id), self.scale))
            .collect();

        for descriptor in &descriptors {
            let handle = layer.add_marker(descriptor);
            let fallback = match &descriptor.on_image_error {
                MarkerAction::ShowFallback(label) => label.clone(),
                MarkerAction::Select(_) => String::new(),
            };
            self.rendered.push(RenderedMarker {
                handle,
                entity_id: descriptor.entity_id,
                fallback,
            });
        }

        tracing::debug!(
            markers = descriptors.len(),
            entities = entities.len(),
            radius = %radius,
            "Rendered overlay"
        );
        descriptors
    }

    /// Remove every drawn marker
    pub fn remove_all<L: MapLayer + ?Sized>(&mut self, layer: &mut L) {
        for marker in self.rendered.drain(..) {
            layer.remove_marker(marker.handle);
        }
    }

    /// Rescale drawn markers for a new zoom level. Membership is unchanged.
    pub fn set_zoom<L: MapLayer + ?Sized>(&mut self, layer: &mut L, zoom_level: f64) -> f64 {
        let scale = zoom_scale(self.reference_zoom, zoom_level);
        if scale != self.scale {
            self.scale = scale;
            for marker in &self.rendered {
                layer.resize_marker(&marker.handle, scale);
            }
        }
        scale
    }

    /// Swap a marker's image for its text label after the image failed
    pub fn handle_image_error<L: MapLayer + ?Sized>(&self, layer: &mut L, id: EntityId) -> bool {
        match self.rendered.iter().find(|m| m.entity_id == id) {
            Some(marker) => {
                layer.show_fallback(&marker.handle, &marker.fallback);
                true
            }
            None => false,
        }
    }

    /// Resolve a marker click to the entity to select
    pub fn click<'a>(&self, entities: &'a [Entity], id: EntityId) -> Option<&'a Entity> {
        if !self.is_rendered(id) {
            return None;
        }
        entities.iter().find(|e| e.id == id)
    }
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("rendered", &self.rendered.len())
            .field("scale", &self.scale)
            .finish()
    }
}

/// A marker as held by [`SceneLayer`]
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMarker {
    pub descriptor: MarkerDescriptor,
    pub scale: f64,
    pub fallback_shown: Option<String>,
}

/// In-memory map layer for headless runs and tests
#[derive(Debug, Default)]
pub struct SceneLayer {
    next_id: u64,
    markers: HashMap<u64, SceneMarker>,
    search_circle: Option<(Position, f64)>,
    center_marker: Option<Position>,
    provider_key: Option<String>,
    added: usize,
    removed: usize,
}

impl SceneLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn markers(&self) -> impl Iterator<Item = &SceneMarker> {
        self.markers.values()
    }

    pub fn marker_for(&self, id: EntityId) -> Option<&SceneMarker> {
        self.markers.values().find(|m| m.descriptor.entity_id == id)
    }

    pub fn search_circle(&self) -> Option<(Position, f64)> {
        self.search_circle
    }

    pub fn center_marker(&self) -> Option<Position> {
        self.center_marker
    }

    pub fn provider_key(&self) -> Option<&str> {
        self.provider_key.as_deref()
    }

    /// Total adds and removes since creation
    pub fn churn(&self) -> (usize, usize) {
        (self.added, self.removed)
    }
}

impl MapLayer for SceneLayer {
    fn set_provider_key(&mut self, key: &str) {
        self.provider_key = Some(key.to_string());
    }

    fn add_marker(&mut self, descriptor: &MarkerDescriptor) -> MarkerHandle {
        self.next_id += 1;
        self.added += 1;
        self.markers.insert(
            self.next_id,
            SceneMarker {
                descriptor: descriptor.clone(),
                scale: descriptor.scale,
                fallback_shown: None,
            },
        );
        MarkerHandle::new(self.next_id)
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if self.markers.remove(&handle.id()).is_some() {
            self.removed += 1;
        }
    }

    fn resize_marker(&mut self, handle: &MarkerHandle, scale: f64) {
        if let Some(marker) = self.markers.get_mut(&handle.id()) {
            marker.scale = scale;
        }
    }

    fn show_fallback(&mut self, handle: &MarkerHandle, label: &str) {
        if let Some(marker) = self.markers.get_mut(&handle.id()) {
            marker.fallback_shown = Some(label.to_string());
        }
    }

    fn set_search_circle(&mut self, center: Position, radius_km: f64) {
        self.search_circle = Some((center, radius_km));
    }

    fn clear_search_circle(&mut self) {
        self.search_circle = None;
    }

    fn set_center_marker(&mut self, center: Position) {
        self.center_marker = Some(center);
    }

    fn clear_center_marker(&mut self) {
        self.center_marker = None;
    }
}
