//! # Engine Boundary
//!
//! The streaming core never touches an engine directly. It asks for render
//! slots once, at startup, and afterwards only flips them on and off and
//! hands them geometry. The viewpoint comes in through a second trait.
//!
//! [`RecordingBackend`] implements the boundary headlessly: it remembers
//! the state of every slot and logs every call, for tests and the demo.

use std::sync::Arc;

use parking_lot::RwLock;

use horizon_procedural::{CollisionShape, MeshGeometry};

/// Render and physics calls the scheduler issues.
pub trait RenderBackend {
    /// Engine handle for one reusable render object.
    type Handle;

    /// Creates one render object. Called `pool_capacity` times at startup,
    /// never afterwards.
    fn instantiate_render_slot(&mut self, index: usize) -> Self::Handle;

    /// Shows or hides a render object.
    fn set_active(&mut self, handle: &Self::Handle, active: bool);

    /// Replaces the object's mesh.
    fn assign_mesh(&mut self, handle: &Self::Handle, geometry: Arc<MeshGeometry>);

    /// Moves the object to a world position.
    fn set_world_position(&mut self, handle: &Self::Handle, position: [f32; 3]);

    /// Turns the object's collider on or off.
    fn set_collision_enabled(&mut self, handle: &Self::Handle, enabled: bool);

    /// Replaces the object's collider shape.
    fn set_collision_shape(&mut self, handle: &Self::Handle, shape: Arc<CollisionShape>);

    /// Names the object after the chunk it shows.
    fn set_label(&mut self, _handle: &Self::Handle, _label: &str) {}
}

/// Supplies the position chunks are streamed around.
pub trait ViewpointSource {
    /// Current viewpoint in world space.
    fn viewpoint_position(&self) -> [f32; 3];
}

impl ViewpointSource for [f32; 3] {
    fn viewpoint_position(&self) -> [f32; 3] {
        *self
    }
}

/// A viewpoint that can be moved from elsewhere, e.g. a camera thread.
#[derive(Clone, Debug, Default)]
pub struct SharedViewpoint {
    position: Arc<RwLock<[f32; 3]>>,
}

impl SharedViewpoint {
    /// Creates a viewpoint at `position`.
    #[must_use]
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position: Arc::new(RwLock::new(position)),
        }
    }

    /// Moves the viewpoint.
    pub fn set(&self, position: [f32; 3]) {
        *self.position.write() = position;
    }
}

impl ViewpointSource for SharedViewpoint {
    fn viewpoint_position(&self) -> [f32; 3] {
        *self.position.read()
    }
}

/// One boundary call, as seen by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    /// `instantiate_render_slot`
    Instantiate(usize),
    /// `set_active`
    SetActive(usize, bool),
    /// `assign_mesh`, with the vertex count
    AssignMesh(usize, usize),
    /// `set_world_position`
    SetPosition(usize, [f32; 3]),
    /// `set_collision_enabled`
    SetCollisionEnabled(usize, bool),
    /// `set_collision_shape`, with the triangle count
    SetCollisionShape(usize, usize),
    /// `set_label`
    SetLabel(usize, String),
}

/// Last known state of one recorded slot.
#[derive(Clone, Debug, Default)]
pub struct RecordedSlot {
    /// Visible.
    pub active: bool,
    /// World position.
    pub position: [f32; 3],
    /// Label, e.g. `Chunk 3, -1`.
    pub label: String,
    /// Mesh currently assigned.
    pub mesh: Option<Arc<MeshGeometry>>,
    /// Collider on.
    pub collision_enabled: bool,
    /// Collider shape currently assigned.
    pub collision: Option<Arc<CollisionShape>>,
}

/// Headless backend whose handles are slot indices.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    slots: Vec<RecordedSlot>,
    calls: Vec<BackendCall>,
}

impl RecordingBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Forgets the call log, keeping slot state.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// All slots.
    #[must_use]
    pub fn slots(&self) -> &[RecordedSlot] {
        &self.slots
    }

    /// Visible slots.
    pub fn active_slots(&self) -> impl Iterator<Item = &RecordedSlot> {
        self.slots.iter().filter(|slot| slot.active)
    }

    /// Labels assigned so far, in call order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.calls.iter().filter_map(|call| match call {
            BackendCall::SetLabel(_, label) => Some(label.as_str()),
            _ => None,
        })
    }

    fn slot_mut(&mut self, handle: usize) -> &mut RecordedSlot {
        if handle >= self.slots.len() {
            self.slots.resize_with(handle + 1, RecordedSlot::default);
        }
        &mut self.slots[handle]
    }

    fn record(&mut self, call: BackendCall) {
        tracing::trace!(?call, "backend call");
        self.calls.push(call);
    }
}

impl RenderBackend for RecordingBackend {
    type Handle = usize;

    fn instantiate_render_slot(&mut self, index: usize) -> usize {
        self.slot_mut(index);
        self.record(BackendCall::Instantiate(index));
        index
    }

    fn set_active(&mut self, handle: &usize, active: bool) {
        self.slot_mut(*handle).active = active;
        self.record(BackendCall::SetActive(*handle, active));
    }

    fn assign_mesh(&mut self, handle: &usize, geometry: Arc<MeshGeometry>) {
        let vertices = geometry.positions.len();
        self.slot_mut(*handle).mesh = Some(geometry);
        self.record(BackendCall::AssignMesh(*handle, vertices));
    }

    fn set_world_position(&mut self, handle: &usize, position: [f32; 3]) {
        self.slot_mut(*handle).position = position;
        self.record(BackendCall::SetPosition(*handle, position));
    }

    fn set_collision_enabled(&mut self, handle: &usize, enabled: bool) {
        self.slot_mut(*handle).collision_enabled = enabled;
        self.record(BackendCall::SetCollisionEnabled(*handle, enabled));
    }

    fn set_collision_shape(&mut self, handle: &usize, shape: Arc<CollisionShape>) {
        let triangles = shape.triangle_count();
        self.slot_mut(*handle).collision = Some(shape);
        self.record(BackendCall::SetCollisionShape(*handle, triangles));
    }

    fn set_label(&mut self, handle: &usize, label: &str) {
        self.slot_mut(*handle).label = label.to_owned();
        self.record(BackendCall::SetLabel(*handle, label.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_tracks_state() {
        let mut backend = RecordingBackend::new();
        let handle = backend.instantiate_render_slot(2);
        assert_eq!(backend.slots().len(), 3);

        backend.set_active(&handle, true);
        backend.set_world_position(&handle, [100.0, 0.0, -200.0]);
        backend.set_label(&handle, "Chunk 1, -2");

        let slot = &backend.slots()[2];
        assert!(slot.active);
        assert_eq!(slot.position, [100.0, 0.0, -200.0]);
        assert_eq!(backend.labels().collect::<Vec<_>>(), vec!["Chunk 1, -2"]);
        assert_eq!(backend.active_slots().count(), 1);
        assert_eq!(backend.calls()[0], BackendCall::Instantiate(2));
    }

    #[test]
    fn test_shared_viewpoint() {
        let viewpoint = SharedViewpoint::new([1.0, 2.0, 3.0]);
        let camera = viewpoint.clone();
        camera.set([10.0, 0.0, -5.0]);
        assert_eq!(viewpoint.viewpoint_position(), [10.0, 0.0, -5.0]);
        assert_eq!([4.0f32, 5.0, 6.0].viewpoint_position(), [4.0, 5.0, 6.0]);
    }
}
