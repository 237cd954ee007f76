//! Serialized projection of the surface registry.
//!
//! The windows section is computed from the surface map at snapshot time
//! (parent resolution and children inversion included) rather than being
//! mutated alongside it, so the two can never fall out of sync.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bridge::registry::{Surface, SurfaceRegistry};

/// One surface as persisted in the registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSnapshot {
    pub surface_id: String,
    pub window_id: String,
    pub role: Option<String>,
    pub title: Option<String>,
    pub format: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub parent_surface_id: Option<String>,
    pub states: Vec<String>,
    pub latest_seq: Option<u64>,
    pub latest_sha256: Option<String>,
    pub latest_path: Option<String>,
}

/// One derived window as persisted in the registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub window_id: String,
    pub surface_id: String,
    pub title: Option<String>,
    pub role: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub w: Option<u32>,
    pub h: Option<u32>,
    /// Resolved through the parent surface's window; `None` when the
    /// parent edge dangles.
    pub parent_window_id: Option<String>,
    pub states: Vec<String>,
    pub children: Vec<String>,
}

/// The full persisted registry view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub surfaces: BTreeMap<String, SurfaceSnapshot>,
    pub windows: BTreeMap<String, WindowSnapshot>,
    pub focused_window_id: Option<String>,
    pub z_order: Vec<String>,
}

impl RegistrySnapshot {
    /// Render the current registry state. Pure projection; no I/O.
    #[must_use]
    pub fn render(registry: &SurfaceRegistry) -> Self {
        let surfaces = registry
            .surfaces()
            .iter()
            .map(|(id, surface)| (id.clone(), surface_snapshot(surface)))
            .collect();

        // Invert child -> parent edges into per-window children lists.
        // BTreeMap iteration keeps the lists in surface-id order.
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for surface in registry.surfaces().values() {
            if let Some(parent) = resolve_parent(registry, surface) {
                children.entry(parent).or_default().push(surface.window_id());
            }
        }

        let windows = registry
            .surfaces()
            .values()
            .map(|surface| {
                let win = surface.window_id();
                let kids = children.remove(&win).unwrap_or_default();
                (win.clone(), window_snapshot(registry, surface, win, kids))
            })
            .collect();

        Self {
            surfaces,
            windows,
            focused_window_id: registry.focused_window_id().map(String::from),
            z_order: registry.z_order().to_vec(),
        }
    }
}

/// Resolve a surface's parent edge to the parent's window id, if the
/// parent surface is still live.
fn resolve_parent(registry: &SurfaceRegistry, surface: &Surface) -> Option<String> {
    let parent_id = surface.parent_surface_id.as_deref()?;
    registry.get(parent_id).map(Surface::window_id)
}

fn surface_snapshot(surface: &Surface) -> SurfaceSnapshot {
    SurfaceSnapshot {
        surface_id: surface.id.clone(),
        window_id: surface.window_id(),
        role: surface.role.clone(),
        title: surface.title.clone(),
        format: surface.format.clone(),
        x: surface.x,
        y: surface.y,
        w: surface.w,
        h: surface.h,
        parent_surface_id: surface.parent_surface_id.clone(),
        states: surface.states.clone(),
        latest_seq: surface.latest_seq,
        latest_sha256: surface.latest_sha256.clone(),
        latest_path: surface.latest_path.clone(),
    }
}

fn window_snapshot(
    registry: &SurfaceRegistry,
    surface: &Surface,
    window_id: String,
    children: Vec<String>,
) -> WindowSnapshot {
    WindowSnapshot {
        window_id,
        surface_id: surface.id.clone(),
        title: surface.title.clone(),
        role: surface.role.clone(),
        x: surface.x,
        y: surface.y,
        w: surface.w,
        h: surface.h,
        parent_window_id: resolve_parent(registry, surface),
        states: surface.states.clone(),
        children,
    }
}
