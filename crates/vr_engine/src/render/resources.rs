//! Scene resources context
//!
//! Owns every instanced mesh of the playlist scene. The pools are allocated
//! once, when the room count is known, and never resized. Each room is handed
//! a [`RoomSlots`] range and only ever writes inside it, so rooms can update
//! the shared pools in the same frame without coordination.
//!
//! ```text
//! SceneResources
//!   ├── head pool   [room 0: 0..P) [room 1: P..2P) ...
//!   ├── hand pool   [room 0: 0..2P) [room 1: 2P..4P) ...
//!   └── room shells (default / orthographic), one slot per room
//! ```

use std::ops::Range;

use slotmap::{new_key_type, SlotMap};

use crate::foundation::math::Vec3;
use crate::render::{InstancedMesh, MeshKind, RenderError, RenderResult};

new_key_type! {
    /// Stable handle to an instanced mesh owned by [`SceneResources`]
    pub struct MeshKey;
}

/// Which room shell geometry is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoomModel {
    /// Regular perspective room shell
    #[default]
    Default,
    /// Shell used by the orthographic presentation mode
    Orthographic,
}

/// Slot ranges reserved for one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSlots {
    /// Room index the slots belong to
    pub room_index: usize,
    /// Head slots, one per performer
    pub head: Range<usize>,
    /// Hand slots, two per performer (left then right)
    pub hand: Range<usize>,
}

impl RoomSlots {
    /// Head slot for a performer
    pub fn head_slot(&self, performer: usize) -> Option<usize> {
        let slot = self.head.start + performer;
        (slot < self.head.end).then_some(slot)
    }

    /// Left and right hand slots for a performer
    pub fn hand_slots(&self, performer: usize) -> Option<(usize, usize)> {
        let left = self.hand.start + performer * 2;
        (left + 1 < self.hand.end).then_some((left, left + 1))
    }

    /// Number of performers that fit in this room
    pub fn performer_capacity(&self) -> usize {
        self.head.len()
    }
}

/// Explicitly passed owner of the scene's instanced meshes
#[derive(Debug)]
pub struct SceneResources {
    meshes: SlotMap<MeshKey, InstancedMesh>,
    head_pool: MeshKey,
    hand_pool: MeshKey,
    default_shell: MeshKey,
    orthographic_shell: MeshKey,
    active_model: RoomModel,
    max_rooms: usize,
    performers_per_room: usize,
    next_room: usize,
}

impl SceneResources {
    /// Allocate all pools for `max_rooms` rooms of `performers_per_room` performers
    ///
    /// `palette` colours the room shells and is cycled by room index for the
    /// performer slots.
    pub fn allocate(max_rooms: usize, performers_per_room: usize, palette: &[[f32; 4]]) -> Self {
        let color = |room: usize| {
            if palette.is_empty() {
                [1.0, 1.0, 1.0, 1.0]
            } else {
                palette[room % palette.len()]
            }
        };

        let mut heads = InstancedMesh::new(
            "heads",
            MeshKind::Head,
            max_rooms * performers_per_room,
            color(0),
        );
        let mut hands = InstancedMesh::new(
            "hands",
            MeshKind::Hand,
            max_rooms * performers_per_room * 2,
            color(0),
        );

        // Nothing draws until a room writes a pose into its slots
        for room in 0..max_rooms {
            let costume = color(room);
            let head_slots = room * performers_per_room..(room + 1) * performers_per_room;
            let hand_slots = head_slots.start * 2..head_slots.end * 2;
            for (mesh, slots) in [(&mut heads, head_slots), (&mut hands, hand_slots)] {
                for slot in slots {
                    let prepared = mesh
                        .set_color_at(slot, costume)
                        .and_then(|()| mesh.release_at(slot));
                    if let Err(e) = prepared {
                        log::warn!("Could not prepare slot {}: {}", slot, e);
                    }
                }
            }
        }

        let mut orthographic = InstancedMesh::new(
            "room-shells-orthographic",
            MeshKind::OrthographicRoomShell,
            max_rooms,
            color(0),
        );
        orthographic.set_visible(false);

        let mut meshes = SlotMap::with_key();
        let head_pool = meshes.insert(heads);
        let hand_pool = meshes.insert(hands);
        let default_shell = meshes.insert(InstancedMesh::new(
            "room-shells",
            MeshKind::RoomShell,
            max_rooms,
            color(0),
        ));
        let orthographic_shell = meshes.insert(orthographic);

        log::info!(
            "Allocated scene resources: {} rooms x {} performers ({} head, {} hand slots)",
            max_rooms,
            performers_per_room,
            max_rooms * performers_per_room,
            max_rooms * performers_per_room * 2
        );

        Self {
            meshes,
            head_pool,
            hand_pool,
            default_shell,
            orthographic_shell,
            active_model: RoomModel::Default,
            max_rooms,
            performers_per_room,
            next_room: 0,
        }
    }

    /// Maximum number of rooms the pools were sized for
    pub fn max_rooms(&self) -> usize {
        self.max_rooms
    }

    /// Performer slots reserved per room
    pub fn performers_per_room(&self) -> usize {
        self.performers_per_room
    }

    /// Slot ranges for a room index
    pub fn room_slots(&self, room_index: usize) -> RenderResult<RoomSlots> {
        if room_index >= self.max_rooms {
            return Err(RenderError::SlotOutOfRange {
                mesh: "room-shells".to_string(),
                index: room_index,
                capacity: self.max_rooms,
            });
        }
        let p = self.performers_per_room;
        Ok(RoomSlots {
            room_index,
            head: room_index * p..(room_index + 1) * p,
            hand: room_index * p * 2..(room_index + 1) * p * 2,
        })
    }

    /// Hand out the next room index
    ///
    /// Indices increase monotonically, which keeps every room's slot range
    /// disjoint from every other room's.
    pub fn reserve_room(&mut self) -> RenderResult<RoomSlots> {
        let slots = self.room_slots(self.next_room)?;
        self.next_room += 1;
        Ok(slots)
    }

    /// Shared head pool
    pub fn heads_mut(&mut self) -> &mut InstancedMesh {
        &mut self.meshes[self.head_pool]
    }

    /// Shared hand pool
    pub fn hands_mut(&mut self) -> &mut InstancedMesh {
        &mut self.meshes[self.hand_pool]
    }

    /// Shared head pool (read-only)
    pub fn heads(&self) -> &InstancedMesh {
        &self.meshes[self.head_pool]
    }

    /// Shared hand pool (read-only)
    pub fn hands(&self) -> &InstancedMesh {
        &self.meshes[self.hand_pool]
    }

    /// Room shell mesh for a model
    pub fn room_shell(&self, model: RoomModel) -> &InstancedMesh {
        match model {
            RoomModel::Default => &self.meshes[self.default_shell],
            RoomModel::Orthographic => &self.meshes[self.orthographic_shell],
        }
    }

    /// Place a room's shell; both models are kept in sync
    pub fn set_room_position(&mut self, room_index: usize, position: Vec3) -> RenderResult<()> {
        for key in [self.default_shell, self.orthographic_shell] {
            self.meshes[key].set_position_at(room_index, position)?;
        }
        Ok(())
    }

    /// Currently drawn room model
    pub fn active_model(&self) -> RoomModel {
        self.active_model
    }

    /// Whether the orthographic room model is drawn
    pub fn is_orthographic(&self) -> bool {
        self.active_model == RoomModel::Orthographic
    }

    /// Swap the drawn room shell model
    pub fn switch_model(&mut self, model: RoomModel) {
        if model == self.active_model {
            return;
        }
        let orthographic = model == RoomModel::Orthographic;
        self.meshes[self.default_shell].set_visible(!orthographic);
        self.meshes[self.orthographic_shell].set_visible(orthographic);
        self.active_model = model;
        log::info!("Switched room model to {:?}", model);
    }

    /// Collapse every slot of a room so it no longer draws
    ///
    /// Every slot in range is released even when some are not; the first
    /// failure is returned.
    pub fn release_room(&mut self, slots: &RoomSlots) -> RenderResult<()> {
        let mut first_error = None;
        let mut note = |result: RenderResult<()>| {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        };
        for slot in slots.head.clone() {
            note(self.heads_mut().release_at(slot));
        }
        for slot in slots.hand.clone() {
            note(self.hands_mut().release_at(slot));
        }
        for key in [self.default_shell, self.orthographic_shell] {
            note(self.meshes[key].release_at(slots.room_index));
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                log::debug!("Released instance slots of room {}", slots.room_index);
                Ok(())
            }
        }
    }

    /// Look up a mesh by handle
    pub fn mesh(&self, key: MeshKey) -> Option<&InstancedMesh> {
        self.meshes.get(key)
    }

    /// All meshes currently part of the drawn scene
    pub fn visible_meshes(&self) -> impl Iterator<Item = (MeshKey, &InstancedMesh)> {
        self.meshes.iter().filter(|(_, mesh)| mesh.is_visible())
    }

    /// Mutable access to all meshes, for uploaders that consume dirty flags
    pub fn meshes_mut(&mut self) -> impl Iterator<Item = (MeshKey, &mut InstancedMesh)> {
        self.meshes.iter_mut()
    }
}
