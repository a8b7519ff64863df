//! Geometry in document space.
//!
//! - [`Point`] - a position
//! - [`Size`] - a width and height
//! - [`Bounds`] - an axis-aligned rectangle stored as min/max corners
//!
//! X grows to the right and Y grows downward. Coordinates may be negative;
//! the document extent follows parts placed left of or above the origin.

use serde::{Deserialize, Serialize};

/// A position in document space.
///
/// ```
/// # use vellum_core::geometry::Point;
/// let moved = Point::new(10.0, 20.0).add_point(Point::new(-4.0, 1.0));
/// assert_eq!(moved, Point::new(6.0, 21.0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(self) -> f32 {
        self.x
    }

    pub fn y(self) -> f32 {
        self.y
    }

    /// The same point with its x-coordinate replaced.
    pub fn with_x(self, x: f32) -> Self {
        Self { x, ..self }
    }

    /// The same point with its y-coordinate replaced.
    pub fn with_y(self, y: f32) -> Self {
        Self { y, ..self }
    }

    /// Component-wise sum, used as "offset by".
    pub fn add_point(self, offset: Point) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y)
    }

    /// Component-wise difference: the offset from `origin` to `self`.
    pub fn sub_point(self, origin: Point) -> Self {
        Self::new(self.x - origin.x, self.y - origin.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn width(self) -> f32 {
        self.width
    }

    pub fn height(self) -> f32 {
        self.height
    }

    /// True when either dimension is below zero.
    pub fn is_negative(self) -> bool {
        self.width < 0.0 || self.height < 0.0
    }
}

/// An axis-aligned rectangle.
///
/// Edges are inclusive for containment and intersection tests. A rectangle
/// whose max corner lies below its min corner has a negative size; the
/// document refuses to assign such bounds to a part.
///
/// ```
/// # use vellum_core::geometry::{Bounds, Point};
/// let frame = Bounds::new(0.0, 0.0, 10.0, 10.0);
/// assert!(frame.contains_point(Point::new(10.0, 5.0)));
/// assert!(!frame.contains_point(Point::new(10.5, 5.0)));
/// assert_eq!(frame.merge(&Bounds::new(5.0, 5.0, 10.0, 10.0)), Bounds::new(0.0, 0.0, 15.0, 15.0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    /// A rectangle with its top-left corner at `(x, y)`.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + width,
            max_y: y + height,
        }
    }

    pub fn new_from_top_left(top_left: Point, size: Size) -> Self {
        Self::new(top_left.x, top_left.y, size.width, size.height)
    }

    /// The smallest rectangle covering every point, or `None` without any.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<Self>, p| {
            Some(match acc {
                None => Self::new(p.x, p.y, 0.0, 0.0),
                Some(b) => Self {
                    min_x: b.min_x.min(p.x),
                    min_y: b.min_y.min(p.y),
                    max_x: b.max_x.max(p.x),
                    max_y: b.max_y.max(p.y),
                },
            })
        })
    }

    pub fn min_x(self) -> f32 {
        self.min_x
    }

    pub fn min_y(self) -> f32 {
        self.min_y
    }

    pub fn max_x(self) -> f32 {
        self.max_x
    }

    pub fn max_y(self) -> f32 {
        self.max_y
    }

    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    /// The top-left corner.
    pub fn min_point(self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    pub fn center(self) -> Point {
        Point::new(self.min_x + self.width() / 2.0, self.min_y + self.height() / 2.0)
    }

    pub fn to_size(self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn has_negative_size(self) -> bool {
        self.to_size().is_negative()
    }

    /// The union of two rectangles.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: f32::min(self.min_x, other.min_x),
            min_y: f32::min(self.min_y, other.min_y),
            max_x: f32::max(self.max_x, other.max_x),
            max_y: f32::max(self.max_y, other.max_y),
        }
    }

    pub fn translate(&self, offset: Point) -> Self {
        self.inflate_by(-offset.x, -offset.y, offset.x, offset.y)
    }

    /// Pushes every edge outward by `margin`.
    pub fn inflate(&self, margin: f32) -> Self {
        self.inflate_by(margin, margin, margin, margin)
    }

    fn inflate_by(&self, left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            min_x: self.min_x - left,
            min_y: self.min_y - top,
            max_x: self.max_x + right,
            max_y: self.max_y + bottom,
        }
    }

    pub fn contains_point(&self, point: Point) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }

    /// True when `other` lies entirely inside, edges included.
    pub fn contains_bounds(&self, other: &Self) -> bool {
        self.contains_point(other.min_point()) && self.contains_point(Point::new(other.max_x, other.max_y))
    }

    /// True when the rectangles overlap or share an edge.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Maps a point expressed relative to `from` onto the same relative
    /// position inside `self`.
    ///
    /// A zero-width or zero-height source axis maps onto the target's minimum
    /// coordinate on that axis.
    pub fn map_point_from(&self, from: &Self, point: Point) -> Point {
        let fx = if from.width() > 0.0 {
            (point.x - from.min_x) / from.width()
        } else {
            0.0
        };
        let fy = if from.height() > 0.0 {
            (point.y - from.min_y) / from.height()
        } else {
            0.0
        };
        Point::new(
            self.min_x + fx * self.width(),
            self.min_y + fy * self.height(),
        )
    }
}
