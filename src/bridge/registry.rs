//! In-memory surface/window registry.
//!
//! Surfaces are the guest-reported entities; windows are derived 1:1 from
//! live surfaces and never stored separately. All implicit creation goes
//! through [`SurfaceRegistry::get_or_insert`], the single authoritative
//! lookup/create entry point.

use std::collections::BTreeMap;

use crate::bridge::event::SurfaceEvent;

/// Derive the stable window id for a surface id.
///
/// Pure function; the same surface id always maps to the same window id
/// for the lifetime of the process.
#[must_use]
pub fn window_id(surface_id: &str) -> String {
    format!("win-{surface_id}")
}

/// One live surface and everything the host tracks about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Surface {
    pub id: String,
    pub role: Option<String>,
    pub title: Option<String>,
    pub format: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub states: Vec<String>,
    /// Edge to the parent surface, stored on the child only. May dangle
    /// if the parent is destroyed later; rendered as "no parent" then.
    pub parent_surface_id: Option<String>,
    pub latest_seq: Option<u64>,
    pub latest_sha256: Option<String>,
    pub latest_path: Option<String>,
}

impl Surface {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    /// The derived window id for this surface.
    #[must_use]
    pub fn window_id(&self) -> String {
        window_id(&self.id)
    }
}

/// Registry of live surfaces plus the window-level side tables
/// (z-order and focus).
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: BTreeMap<String, Surface>,
    /// Live window ids, back to front (tail = front-most). No duplicates;
    /// every entry corresponds to a live surface.
    z_order: Vec<String>,
    focused_window_id: Option<String>,
}

impl SurfaceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a surface, creating it (and registering its window in the
    /// z-order) if this id has not been seen before.
    pub fn get_or_insert(&mut self, id: &str) -> &mut Surface {
        if !self.surfaces.contains_key(id) {
            tracing::debug!(surface_id = %id, "implicitly creating surface");
            let win = window_id(id);
            if !self.z_order.contains(&win) {
                self.z_order.push(win);
            }
        }
        self.surfaces
            .entry(id.to_string())
            .or_insert_with(|| Surface::new(id))
    }

    /// Apply one decoded protocol event.
    ///
    /// Frame events are not handled here; the bridge owns frame assembly.
    pub fn apply(&mut self, event: &SurfaceEvent) {
        match event {
            SurfaceEvent::Create {
                id,
                role,
                title,
                format,
                w,
                h,
            } => {
                let surface = self.get_or_insert(id);
                // Re-creation is last-write-wins, including clearing
                // metadata keys absent from the new announcement.
                surface.role = role.clone();
                surface.title = title.clone();
                surface.format = format.clone();
                if w.is_some() {
                    surface.w = *w;
                }
                if h.is_some() {
                    surface.h = *h;
                }
            }
            SurfaceEvent::Configure { id, x, y, w, h } => {
                let surface = self.get_or_insert(id);
                if x.is_some() {
                    surface.x = *x;
                }
                if y.is_some() {
                    surface.y = *y;
                }
                if w.is_some() {
                    surface.w = *w;
                }
                if h.is_some() {
                    surface.h = *h;
                }
            }
            SurfaceEvent::Role { id, role } => {
                let surface = self.get_or_insert(id);
                if role.is_some() {
                    surface.role = role.clone();
                }
            }
            SurfaceEvent::State { id, states } => {
                self.get_or_insert(id).states = states.clone();
            }
            SurfaceEvent::Parent { id, parent } => {
                self.get_or_insert(parent);
                self.get_or_insert(id).parent_surface_id = Some(parent.clone());
            }
            SurfaceEvent::Focus { id, focused } => {
                let win = self.get_or_insert(id).window_id();
                if *focused {
                    self.focused_window_id = Some(win.clone());
                    // Bring to front: remove and re-append so membership
                    // stays single.
                    self.z_order.retain(|w| w != &win);
                    self.z_order.push(win);
                } else if self.focused_window_id.as_deref() == Some(win.as_str()) {
                    self.focused_window_id = None;
                }
            }
            SurfaceEvent::Destroy { id } => self.destroy(id),
            SurfaceEvent::FrameBegin { .. } | SurfaceEvent::FrameEnd { .. } => {}
        }
    }

    /// Drop a surface and its derived window, clearing focus if it held it.
    pub fn destroy(&mut self, id: &str) {
        if self.surfaces.remove(id).is_none() {
            return;
        }
        tracing::debug!(surface_id = %id, "surface destroyed");
        let win = window_id(id);
        self.z_order.retain(|w| w != &win);
        if self.focused_window_id.as_deref() == Some(win.as_str()) {
            self.focused_window_id = None;
        }
    }

    /// Record the latest flushed frame on the owning surface.
    ///
    /// Last processed wins: an older sequence number flushed after a newer
    /// one overwrites the recorded latest state.
    pub fn record_frame(&mut self, surface_id: &str, seq: u64, sha256: &str, path: &str) {
        let surface = self.get_or_insert(surface_id);
        surface.latest_seq = Some(seq);
        surface.latest_sha256 = Some(sha256.to_string());
        surface.latest_path = Some(path.to_string());
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    #[must_use]
    pub fn surfaces(&self) -> &BTreeMap<String, Surface> {
        &self.surfaces
    }

    #[must_use]
    pub fn z_order(&self) -> &[String] {
        &self.z_order
    }

    #[must_use]
    pub fn focused_window_id(&self) -> Option<&str> {
        self.focused_window_id.as_deref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}
