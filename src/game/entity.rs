use crate::util::vec2::Vec2;

/// Entity id as sent by the server (0 is the add-record sentinel)
pub type EntityId = u32;

/// Snapshot of one visible entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub x: i32,
    pub y: i32,
    pub size: u16,
    pub is_virus: bool,
    pub is_pellet: bool,
    pub name: Option<String>,
}

impl Entity {
    pub fn position(&self) -> Vec2 {
        Vec2::new(f64::from(self.x), f64::from(self.y))
    }

    /// True only when a name is present and equal; an unnamed entity never matches
    pub fn has_name(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    /// Pellets that are not also viruses are food
    pub fn is_food(&self) -> bool {
        self.is_pellet && !self.is_virus
    }

    /// Replace this snapshot with a newer one, keeping a known name when
    /// the newer record carries none
    pub fn merge(&mut self, mut newer: Entity) {
        if newer.name.is_none() {
            newer.name = self.name.take();
        }
        *self = newer;
    }
}
