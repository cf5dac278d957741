//! Per-session view of the world
//!
//! The server streams viewport deltas (eat records, add/update records and
//! remove records). Deltas are decoded in full before anything is applied,
//! so a truncated frame leaves the viewport exactly as it was.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::game::entity::{Entity, EntityId};
use crate::protocol::constants::viewport::*;
use crate::protocol::cursor::{ByteCursor, CursorError};
use crate::util::vec2::Vec2;

/// One decoded viewport-delta frame (inner opcode 16)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewportDelta {
    /// Number of eat records skipped
    pub eat_records: u16,
    pub upserts: Vec<Entity>,
    pub removals: Vec<EntityId>,
}

impl ViewportDelta {
    /// Decode the body of a viewport-delta frame (cursor past the opcode)
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self, CursorError> {
        let eat_records = cursor.read_u16()?;
        cursor.skip(usize::from(eat_records) * EAT_RECORD_LEN)?;

        let mut upserts = Vec::new();
        loop {
            let id = cursor.read_u32()?;
            if id == 0 {
                break;
            }
            upserts.push(decode_entity(id, cursor)?);
        }

        let removal_count = cursor.read_u16()?;
        let mut removals = Vec::with_capacity(usize::from(removal_count));
        for _ in 0..removal_count {
            removals.push(cursor.read_u32()?);
        }

        Ok(Self {
            eat_records,
            upserts,
            removals,
        })
    }
}

fn decode_entity(id: EntityId, cursor: &mut ByteCursor<'_>) -> Result<Entity, CursorError> {
    let x = cursor.read_i32()?;
    let y = cursor.read_i32()?;
    let size = cursor.read_u16()?;
    let flags = cursor.read_u8()?;
    let extended = if flags & FLAG_EXTENDED != 0 {
        cursor.read_u8()?
    } else {
        0
    };

    if flags & FLAG_SKIP_COLOR != 0 {
        cursor.skip(3)?;
    }
    if flags & FLAG_SKIP_SKIN != 0 {
        cursor.read_string()?;
    }
    let name = if flags & FLAG_NAME != 0 {
        Some(cursor.read_string()?)
    } else {
        None
    };
    if extended & EXT_SKIP_ACCOUNT != 0 {
        cursor.skip(4)?;
    }

    Ok(Entity {
        id,
        x,
        y,
        size,
        is_virus: flags & FLAG_VIRUS != 0,
        is_pellet: extended & EXT_PELLET != 0,
        name,
    })
}

/// Boundary rectangle frame (inner opcode 64)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundaryRect {
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self, CursorError> {
        Ok(Self {
            left: cursor.read_f64()?,
            top: cursor.read_f64()?,
            right: cursor.read_f64()?,
            bottom: cursor.read_f64()?,
        })
    }

    /// Center of the rectangle, if it spans the full arena on both axes
    pub fn arena_center(&self) -> Option<Vec2> {
        let width = (self.right - self.left) as i32;
        let height = (self.bottom - self.top) as i32;
        (width == BOUNDARY_SPAN && height == BOUNDARY_SPAN).then(|| {
            Vec2::new(
                (self.left + self.right) / 2.0,
                (self.top + self.bottom) / 2.0,
            )
        })
    }
}

/// Counts produced by one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Owned cells dropped by this delta
    pub owned_lost: usize,
}

/// Entity map, owned-cell set and world offset for one session
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    entities: HashMap<EntityId, Entity>,
    owned: SmallVec<[EntityId; 16]>,
    offset: Vec2,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and apply a viewport delta; nothing changes on a decode error
    pub fn reconcile(
        &mut self,
        cursor: &mut ByteCursor<'_>,
    ) -> Result<ReconcileOutcome, CursorError> {
        let delta = ViewportDelta::decode(cursor)?;
        Ok(self.apply(delta))
    }

    pub fn apply(&mut self, delta: ViewportDelta) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for entity in delta.upserts {
            match self.entities.get_mut(&entity.id) {
                Some(existing) => {
                    existing.merge(entity);
                    outcome.updated += 1;
                }
                None => {
                    self.entities.insert(entity.id, entity);
                    outcome.added += 1;
                }
            }
        }

        for id in delta.removals {
            if self.entities.remove(&id).is_some() {
                outcome.removed += 1;
            }
            let before = self.owned.len();
            self.owned.retain(|owned| *owned != id);
            outcome.owned_lost += before - self.owned.len();
        }

        outcome
    }

    /// Apply a boundary rectangle; returns whether the offset changed
    pub fn apply_boundary(&mut self, rect: &BoundaryRect) -> bool {
        match rect.arena_center() {
            Some(center) => {
                self.offset = center;
                true
            }
            None => false,
        }
    }

    /// Record a cell the server assigned to this session
    pub fn assign_cell(&mut self, id: EntityId) {
        self.owned.push(id);
    }

    pub fn owned_cells(&self) -> &[EntityId] {
        &self.owned
    }

    pub fn has_cells(&self) -> bool {
        !self.owned.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// World offset of the arena center
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn reset(&mut self) {
        self.entities.clear();
        self.owned.clear();
        self.offset = Vec2::ZERO;
    }
}
