//! Geometric primitives shared by the model, the layout, and the controller.
//!
//! Coordinates follow screen conventions: origin at the top-left, X grows
//! to the right, Y grows downward.

use serde::{Deserialize, Serialize};

/// A 2-D point (or offset) in model coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn add(self, other: Point) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    pub fn distance(self, other: Point) -> f32 {
        let d = self.sub(other);
        (d.x * d.x + d.y * d.y).sqrt()
    }

    pub fn min(self, other: Point) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    pub fn max(self, other: Point) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// Rectangle with this point as origin.
    pub fn rect(self, width: f32, height: f32) -> Rect {
        Rect::new(self.x, self.y, width, height)
    }

    /// Normalized rectangle spanning this point and `other`, in any order.
    pub fn rect_to(self, other: Point) -> Rect {
        let lo = self.min(other);
        let hi = self.max(other);
        Rect::new(lo.x, lo.y, hi.x - lo.x, hi.y - lo.y)
    }

    /// Round each coordinate up to the next multiple of `size`.
    pub fn snap(self, size: f32) -> Self {
        if size <= 0.0 {
            return self;
        }
        Self::new((self.x / size).ceil() * size, (self.y / size).ceil() * size)
    }
}

/// Width and height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimension {
    pub width: f32,
    pub height: f32,
}

impl Dimension {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

/// Axis-aligned rectangle: origin plus dimension.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn dimension(&self) -> Dimension {
        Dimension::new(self.width, self.height)
    }

    /// Bottom-right corner.
    pub fn corner(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    pub fn top_right(&self) -> Point {
        Point::new(self.x + self.width, self.y)
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.x, self.y + self.height)
    }

    pub fn middle_left(&self) -> Point {
        Point::new(self.x, self.y + self.height / 2.0)
    }

    pub fn middle_right(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height / 2.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// True when `other` lies fully inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.contains(other.origin()) && self.contains(other.corner())
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn union(&self, other: &Rect) -> Rect {
        self.origin()
            .min(other.origin())
            .rect_to(self.corner().max(other.corner()))
    }

    /// Grow by `dx` on the left and right, `dy` on the top and bottom.
    pub fn expand(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    /// Shrink horizontally by `dx` and vertically by `dy` on each side.
    pub fn shrink(&self, dx: f32, dy: f32) -> Rect {
        self.expand(-dx, -dy)
    }

    /// Move the origin by `(dx, dy)` while keeping the bottom-right corner fixed.
    pub fn move_origin(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width - dx, self.height - dy)
    }

    /// Square of side `size` centered on `center`.
    pub fn centered(center: Point, size: f32) -> Rect {
        Rect::new(center.x - size / 2.0, center.y - size / 2.0, size, size)
    }

    /// Translate by a point offset.
    pub fn translate(&self, by: Point) -> Rect {
        Rect::new(self.x + by.x, self.y + by.y, self.width, self.height)
    }

    pub fn with_height(&self, height: f32) -> Rect {
        Rect::new(self.x, self.y, self.width, height)
    }

    pub fn with_width(&self, width: f32) -> Rect {
        Rect::new(self.x, self.y, width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        assert_eq!(Point::new(10.0, 15.0).offset(20.0, 30.0), Point::new(30.0, 45.0));
        assert_eq!(Point::new(40.0, 55.0).sub(Point::new(20.0, 30.0)), Point::new(20.0, 25.0));
        assert_eq!(Point::new(40.0, 55.0).scale(5.0), Point::new(200.0, 275.0));
        assert_eq!(Point::new(40.0, 55.0).distance(Point::new(20.0, 30.0)).floor(), 32.0);
    }

    #[test]
    fn rect_to_normalizes_corners() {
        let r = Point::new(50.0, 10.0).rect_to(Point::new(20.0, 40.0));
        assert_eq!(r, Rect::new(20.0, 10.0, 30.0, 30.0));
    }

    #[test]
    fn contains_rect_requires_full_inclusion() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains_rect(&Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!outer.contains_rect(&Rect::new(90.0, 90.0, 20.0, 20.0)));
    }

    #[test]
    fn union_and_expand() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 10.0, 10.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 30.0, 15.0));
        assert_eq!(a.expand(5.0, 2.0), Rect::new(-5.0, -2.0, 20.0, 14.0));
    }

    #[test]
    fn move_origin_keeps_corner() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0).move_origin(10.0, 10.0);
        assert_eq!(r, Rect::new(20.0, 30.0, 20.0, 30.0));
        assert_eq!(r.corner(), Point::new(40.0, 60.0));
    }

    #[test]
    fn snap_rounds_up_to_grid() {
        assert_eq!(Point::new(11.0, 20.0).snap(10.0), Point::new(20.0, 20.0));
        assert_eq!(Point::new(11.0, 20.0).snap(0.0), Point::new(11.0, 20.0));
    }
}
