//! Collision detection and response for axis-aligned geometry
//!
//! Everything in the playfield is either a circle (balls, drops) or an
//! axis-aligned rectangle (paddle, bricks), so one circle-vs-rect test covers
//! every contact. Response is a component flip chosen per contact.

use glam::Vec2;

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_top_left(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Closest point inside the rectangle
    pub fn clamp_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }
}

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Closest point on the rectangle
    pub point: Vec2,
    /// Axis normal pointing from the rectangle toward the circle
    pub normal: Vec2,
    /// Overlap along the normal (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Circle-vs-rectangle overlap: clamp the center into the rectangle and
/// compare squared distance against squared radius
#[inline]
pub fn circle_rect_overlap(center: Vec2, radius: f32, rect: &Rect) -> bool {
    let closest = rect.clamp_point(center);
    center.distance_squared(closest) <= radius * radius
}

/// Check a ball against a rectangle and pick a bounce axis
///
/// The axis is whichever of x/y has the larger offset from the rectangle
/// center once normalized by that side's half extent. This approximates a
/// contact normal without continuous collision detection.
pub fn ball_rect_collision(center: Vec2, radius: f32, rect: &Rect) -> CollisionResult {
    if !circle_rect_overlap(center, radius, rect) {
        return CollisionResult::miss();
    }

    let offset = center - rect.center();
    let half = rect.half_extents();
    let nx = offset.x / half.x.max(f32::EPSILON);
    let ny = offset.y / half.y.max(f32::EPSILON);

    let (normal, penetration) = if nx.abs() > ny.abs() {
        let sign = if offset.x >= 0.0 { 1.0 } else { -1.0 };
        (Vec2::new(sign, 0.0), half.x + radius - offset.x.abs())
    } else {
        let sign = if offset.y >= 0.0 { 1.0 } else { -1.0 };
        (Vec2::new(0.0, sign), half.y + radius - offset.y.abs())
    };

    CollisionResult {
        hit: true,
        point: rect.clamp_point(center),
        normal,
        penetration: penetration.max(0.0),
    }
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Reflect only if the velocity points into the surface
#[inline]
pub fn bounce_off(velocity: Vec2, normal: Vec2) -> Vec2 {
    if velocity.dot(normal) < 0.0 {
        reflect_velocity(velocity, normal)
    } else {
        velocity
    }
}

/// Which wall a ball touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wall {
    Left,
    Right,
    Top,
}

/// Clamp a ball inside the left/right/top walls, reflecting the matching
/// velocity component for every wall it touched
pub fn resolve_walls(pos: &mut Vec2, vel: &mut Vec2, radius: f32, width: f32) -> Vec<Wall> {
    let mut hits = Vec::new();

    if pos.x - radius < 0.0 {
        pos.x = radius;
        *vel = bounce_off(*vel, Vec2::X);
        hits.push(Wall::Left);
    } else if pos.x + radius > width {
        pos.x = width - radius;
        *vel = bounce_off(*vel, Vec2::NEG_X);
        hits.push(Wall::Right);
    }

    if pos.y - radius < 0.0 {
        pos.y = radius;
        *vel = bounce_off(*vel, Vec2::Y);
        hits.push(Wall::Top);
    }

    hits
}

/// Velocity after a paddle bounce
///
/// `t` is the contact offset from the paddle center in half-widths, clamped
/// to [-1, 1]. It is blended into the horizontal direction, the vertical part
/// is rebuilt from the Pythagorean relation so |v| is unchanged, and the ball
/// always leaves upward.
pub fn paddle_bounce(
    velocity: Vec2,
    ball_x: f32,
    paddle_x: f32,
    paddle_width: f32,
    steer: f32,
    min_vertical_share: f32,
) -> Vec2 {
    let speed = velocity.length();
    if speed <= f32::EPSILON {
        return velocity;
    }

    let t = ((ball_x - paddle_x) / (paddle_width / 2.0)).clamp(-1.0, 1.0);
    let steer = steer.clamp(0.0, 1.0);
    let max_dir_x = (1.0 - min_vertical_share * min_vertical_share).max(0.0).sqrt();

    let dir_x = (velocity.x / speed * (1.0 - steer) + t * steer).clamp(-max_dir_x, max_dir_x);
    let vx = dir_x * speed;
    let vy = -(speed * speed - vx * vx).max(0.0).sqrt();
    Vec2::new(vx, vy)
}
