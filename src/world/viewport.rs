use crate::world::position::Position;

const GROUND_FLOOR: u8 = 7;
const UNDERGROUND_Z_RANGE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u16,
    pub height: u16,
}

impl Default for ViewportSize {
    fn default() -> Self {
        // Classic clients show an 18x14 tile viewport.
        Self { width: 18, height: 14 }
    }
}

/// Area around a viewer in which changes are worth telling them about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub center: Position,
    pub size: ViewportSize,
}

impl Viewport {
    pub fn from_center(center: Position, size: ViewportSize) -> Self {
        Self { center, size }
    }

    /// Surface viewers see every surface floor; underground viewers only
    /// see a couple of floors up and down.
    pub fn sees_floor(&self, z: u8) -> bool {
        if self.center.z <= GROUND_FLOOR {
            z <= GROUND_FLOOR
        } else {
            self.center.z.abs_diff(z) <= UNDERGROUND_Z_RANGE
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        if !self.sees_floor(position.z) {
            return false;
        }
        // floors further away shift diagonally by one tile each
        let offset = i32::from(self.center.z) - i32::from(position.z);
        let x = i32::from(position.x) + offset;
        let y = i32::from(position.y) + offset;
        let half_left = i32::from(self.size.width / 2);
        let half_up = i32::from(self.size.height / 2);
        let min_x = i32::from(self.center.x) - half_left;
        let min_y = i32::from(self.center.y) - half_up;
        let max_x = min_x + i32::from(self.size.width);
        let max_y = min_y + i32::from(self.size.height);
        x >= min_x && x <= max_x && y >= min_y && y <= max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_viewer_sees_nearby_tiles_only() {
        let viewport = Viewport::from_center(Position { x: 100, y: 100, z: 7 }, ViewportSize::default());
        assert!(viewport.contains(Position { x: 108, y: 106, z: 7 }));
        assert!(!viewport.contains(Position { x: 120, y: 100, z: 7 }));
        assert!(!viewport.contains(Position { x: 100, y: 100, z: 8 }));
        assert!(viewport.contains(Position { x: 99, y: 99, z: 6 }));
    }

    #[test]
    fn underground_viewer_limited_to_two_floors() {
        let viewport = Viewport::from_center(Position { x: 50, y: 50, z: 10 }, ViewportSize::default());
        assert!(viewport.sees_floor(12));
        assert!(!viewport.sees_floor(13));
        assert!(!viewport.sees_floor(7));
    }
}
