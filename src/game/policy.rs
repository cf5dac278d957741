//! Movement decision for one bot per tick
//!
//! Follow the operator when follow-mode is active, otherwise flee the
//! nearest close threat, chase the nearest food, or wander.

use rand::Rng;

use crate::game::entity::Entity;
use crate::game::viewport::Viewport;
use crate::protocol::constants::policy::*;
use crate::util::vec2::Vec2;

/// Aggregate of the bot's owned cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotBody {
    pub position: Vec2,
    pub size: f64,
}

impl BotBody {
    /// Centroid and total size of the owned cells
    ///
    /// Cells not yet seen in the viewport still count in the divisor.
    pub fn from_viewport(viewport: &Viewport) -> Self {
        let owned = viewport.owned_cells();
        let count = owned.len().max(1) as f64;
        let mut position = Vec2::ZERO;
        let mut size = 0.0;
        for cell in owned.iter().filter_map(|id| viewport.entity(*id)) {
            position += cell.position() * (1.0 / count);
            size += f64::from(cell.size);
        }
        Self { position, size }
    }
}

/// Why a steering target was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringReason {
    Follow,
    Flee,
    Chase,
    Wander,
}

/// World-space point to steer toward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steering {
    pub target: Vec2,
    pub reason: SteeringReason,
}

/// Everything the policy reads for one decision
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub viewport: &'a Viewport,
    /// The swarm's configured display name (never treated as a threat)
    pub own_name: &'a str,
    /// Operator cursor, present only while follow-mode is active for this bot
    pub follow_cursor: Option<Vec2>,
}

/// Closest entity matching a predicate
#[derive(Debug, Clone, Copy)]
pub struct Nearest<'a> {
    pub entity: &'a Entity,
    pub distance: f64,
}

fn nearest<'a>(
    viewport: &'a Viewport,
    from: Vec2,
    predicate: impl Fn(&Entity) -> bool,
) -> Option<Nearest<'a>> {
    viewport
        .entities()
        .filter(|entity| predicate(*entity))
        .map(|entity| Nearest {
            entity,
            distance: from.distance_to(entity.position()),
        })
        .fold(None, |best: Option<Nearest<'a>>, candidate| match best {
            Some(b) if b.distance <= candidate.distance => Some(b),
            _ => Some(candidate),
        })
}

/// Nearest entity large enough to eat the bot
pub fn nearest_threat<'a>(
    viewport: &'a Viewport,
    body: &BotBody,
    own_name: &str,
) -> Option<Nearest<'a>> {
    nearest(viewport, body.position, |entity| {
        !entity.is_virus
            && !entity.is_pellet
            && f64::from(entity.size) > body.size * THREAT_SIZE_RATIO
            && !entity.has_name(own_name)
    })
}

/// Nearest pellet
pub fn nearest_food<'a>(viewport: &'a Viewport, body: &BotBody) -> Option<Nearest<'a>> {
    nearest(viewport, body.position, Entity::is_food)
}

/// Pick a steering target; `None` means no move this tick
pub fn decide<R: Rng + ?Sized>(input: &PolicyInput<'_>, rng: &mut R) -> Option<Steering> {
    if let Some(cursor) = input.follow_cursor {
        return Some(Steering {
            target: cursor + input.viewport.offset(),
            reason: SteeringReason::Follow,
        });
    }

    let body = BotBody::from_viewport(input.viewport);
    let threat = nearest_threat(input.viewport, &body, input.own_name);
    let food = nearest_food(input.viewport, &body);

    if let Some(threat) = threat.filter(|t| t.distance < THREAT_RADIUS) {
        let away = (threat.entity.position() - body.position).angle() + std::f64::consts::PI;
        return Some(Steering {
            target: body.position + Vec2::from_angle(away) * FLEE_RADIUS,
            reason: SteeringReason::Flee,
        });
    }

    if let Some(food) = food {
        return Some(Steering {
            target: food.entity.position(),
            reason: SteeringReason::Chase,
        });
    }

    if threat.is_some() {
        return None;
    }

    wander(body.position, rng)
}

fn wander<R: Rng + ?Sized>(from: Vec2, rng: &mut R) -> Option<Steering> {
    let draw: f64 = rng.gen();
    let dx = (WANDER_SPAN * rng.gen::<f64>()).trunc();
    let dy = (WANDER_SPAN * rng.gen::<f64>()).trunc();

    let target = if draw > 0.5 {
        Vec2::new(from.x + dx, from.y - dy)
    } else if draw < 0.5 {
        Vec2::new(from.x - dx, from.y + dy)
    } else {
        return None;
    };

    Some(Steering {
        target,
        reason: SteeringReason::Wander,
    })
}
