//! Instanced mesh transform arenas
//!
//! An [`InstancedMesh`] represents one geometry drawn many times with a single
//! draw call. Each instance owns a fixed slot holding its transform and colour.
//! Capacity is chosen at construction and never changes; writers address
//! slots by index and flag which attributes changed so the backend only
//! re-uploads what it must.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Quat, Transform, Vec3};
use crate::render::{RenderError, RenderResult};

bitflags! {
    /// Per-mesh record of which instance attributes need re-upload
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u8 {
        /// Instance positions changed
        const POSITION = 1 << 0;
        /// Instance orientations changed
        const ROTATION = 1 << 1;
        /// Instance scales changed
        const SCALE = 1 << 2;
        /// Instance colours changed
        const COLOR = 1 << 3;
    }
}

/// Geometry drawn by an instanced mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKind {
    /// Performer head
    Head,
    /// Performer hand
    Hand,
    /// Room shell in the default model
    RoomShell,
    /// Room shell in the orthographic model
    OrthographicRoomShell,
}

/// Instance data structure for GPU upload
/// Must match shader layout exactly
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Model transformation matrix (column-major 4x4)
    pub model_matrix: [[f32; 4]; 4],
    /// Instance colour (RGBA)
    pub color: [f32; 4],
}

/// Fixed-capacity arena of instance transforms for one geometry
#[derive(Debug, Clone)]
pub struct InstancedMesh {
    name: String,
    kind: MeshKind,
    transforms: Vec<Transform>,
    colors: Vec<[f32; 4]>,
    dirty: DirtyFlags,
    visible: bool,
}

impl InstancedMesh {
    /// Create a mesh with `capacity` slots, all at the origin with unit scale
    pub fn new(name: impl Into<String>, kind: MeshKind, capacity: usize, color: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            kind,
            transforms: vec![Transform::identity(); capacity],
            colors: vec![color; capacity],
            dirty: DirtyFlags::all(),
            visible: true,
        }
    }

    /// Mesh name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Geometry of this mesh
    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    /// Number of instance slots
    pub fn capacity(&self) -> usize {
        self.transforms.len()
    }

    /// Whether the mesh is part of the drawn scene
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Add or remove the mesh from the drawn scene
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Transform stored at a slot
    pub fn transform_at(&self, index: usize) -> Option<&Transform> {
        self.transforms.get(index)
    }

    /// Colour stored at a slot
    pub fn color_at(&self, index: usize) -> Option<[f32; 4]> {
        self.colors.get(index).copied()
    }

    /// Set the position of one instance
    pub fn set_position_at(&mut self, index: usize, position: Vec3) -> RenderResult<()> {
        self.slot_mut(index)?.position = position;
        self.dirty |= DirtyFlags::POSITION;
        Ok(())
    }

    /// Set the orientation of one instance
    pub fn set_quaternion_at(&mut self, index: usize, rotation: Quat) -> RenderResult<()> {
        self.slot_mut(index)?.rotation = rotation;
        self.dirty |= DirtyFlags::ROTATION;
        Ok(())
    }

    /// Set the scale of one instance
    pub fn set_scale_at(&mut self, index: usize, scale: Vec3) -> RenderResult<()> {
        self.slot_mut(index)?.scale = scale;
        self.dirty |= DirtyFlags::SCALE;
        Ok(())
    }

    /// Set the colour of one instance
    pub fn set_color_at(&mut self, index: usize, color: [f32; 4]) -> RenderResult<()> {
        let capacity = self.capacity();
        let slot = self.colors.get_mut(index).ok_or_else(|| RenderError::SlotOutOfRange {
            mesh: self.name.clone(),
            index,
            capacity,
        })?;
        *slot = color;
        self.dirty |= DirtyFlags::COLOR;
        Ok(())
    }

    /// Collapse a slot to zero scale so it no longer draws anything
    pub fn release_at(&mut self, index: usize) -> RenderResult<()> {
        self.set_scale_at(index, Vec3::zeros())
    }

    /// Attributes changed since the last upload
    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Return and clear the dirty flags (called by the uploader)
    pub fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::replace(&mut self.dirty, DirtyFlags::empty())
    }

    /// Build the GPU instance buffer contents
    pub fn instance_data(&self) -> Vec<InstanceData> {
        self.transforms
            .iter()
            .zip(&self.colors)
            .map(|(transform, color)| InstanceData {
                model_matrix: transform.to_matrix().into(),
                color: *color,
            })
            .collect()
    }

    /// Raw bytes of the instance buffer, ready for upload
    pub fn instance_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.instance_data()).to_vec()
    }

    fn slot_mut(&mut self, index: usize) -> RenderResult<&mut Transform> {
        let capacity = self.transforms.len();
        let name = &self.name;
        self.transforms.get_mut(index).ok_or_else(|| RenderError::SlotOutOfRange {
            mesh: name.clone(),
            index,
            capacity,
        })
    }
}
