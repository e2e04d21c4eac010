use std::fmt;

pub mod id;

/// Point in the logical coordinate space.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Size in logical pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub w: i32,
    pub h: i32,
}

/// Axis-aligned rectangle in the logical coordinate space.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub loc: Point,
    pub size: Size,
}

/// Bitmask of tags a view or output is on.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tags(pub u32);

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Size {
    pub const fn new(w: i32, h: i32) -> Self {
        Self { w, h }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Size {
    fn from((w, h): (i32, i32)) -> Self {
        Self { w, h }
    }
}

impl Rectangle {
    pub const fn new(loc: Point, size: Size) -> Self {
        Self { loc, size }
    }

    pub const fn from_size(size: Size) -> Self {
        Self {
            loc: Point::new(0, 0),
            size,
        }
    }

    pub fn right(&self) -> i32 {
        self.loc.x + self.size.w
    }

    pub fn bottom(&self) -> i32 {
        self.loc.y + self.size.h
    }

    pub fn is_empty(&self) -> bool {
        self.size.w <= 0 || self.size.h <= 0
    }

    /// Whether the two rectangles share any area.
    pub fn overlaps(&self, other: Rectangle) -> bool {
        self.loc.x < other.right()
            && other.loc.x < self.right()
            && self.loc.y < other.bottom()
            && other.loc.y < self.bottom()
    }

    /// Moves and shrinks this rectangle so that it lies within `area` with `margin` on every side.
    ///
    /// The size is only shrunk along an axis when it does not fit; the position is adjusted after.
    pub fn clamp_into(&mut self, area: Rectangle, margin: i32) {
        self.size.w = self.size.w.min(area.size.w - 2 * margin);
        self.loc.x = self.loc.x.max(area.loc.x + margin);
        self.loc.x = self.loc.x.min(area.right() - margin - self.size.w);

        self.size.h = self.size.h.min(area.size.h - 2 * margin);
        self.loc.y = self.loc.y.max(area.loc.y + margin);
        self.loc.y = self.loc.y.min(area.bottom() - margin - self.size.h);
    }
}

impl From<sluice_ipc::Rect> for Rectangle {
    fn from(rect: sluice_ipc::Rect) -> Self {
        Self::new(
            Point::new(rect.x, rect.y),
            Size::new(rect.width, rect.height),
        )
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.size.w, self.size.h, self.loc.x, self.loc.y
        )
    }
}

impl Tags {
    pub const NONE: Tags = Tags(0);

    pub fn intersects(self, other: Tags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tags({:#b})", self.0)
    }
}
