//! 2D selection descriptors
//!
//! All points are `[x, y]`, all angles are in radians. On the wire a
//! selection is a flat object whose kind is recognised by its distinguishing
//! field (`dimension`, `length`, `lengths`, `points`, `semi_axes`, `radius`,
//! `radii`); an object with none of those is a point selection.

use crate::errors::{PlotError, PlotResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type Point2 = [f64; 2];

pub const DEFAULT_ALPHA: f64 = 0.3;

/// Generate a selection id: the last 8 hex digits of a v4 uuid
pub fn new_selection_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[simple.len() - 8..].to_string()
}

/// Selection variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Point,
    Axial,
    Linear,
    Rectangular,
    Polygonal,
    Circular,
    Elliptical,
    Sectorial,
}

impl SelectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionKind::Point => "point",
            SelectionKind::Axial => "axial",
            SelectionKind::Linear => "linear",
            SelectionKind::Rectangular => "rectangular",
            SelectionKind::Polygonal => "polygonal",
            SelectionKind::Circular => "circular",
            SelectionKind::Elliptical => "elliptical",
            SelectionKind::Sectorial => "sectorial",
        }
    }
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis an axial selection spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }

    pub fn from_index(dimension: u8) -> Option<Self> {
        match dimension {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            _ => None,
        }
    }
}

/// Per-kind geometry
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionShape {
    Point,
    Axial { length: f64, dimension: Axis },
    Linear { length: f64, angle: f64 },
    Rectangular { lengths: [f64; 2], angle: f64 },
    Polygonal { points: Vec<Point2>, closed: bool },
    Circular { radius: f64 },
    Elliptical { semi_axes: [f64; 2], angle: f64 },
    Sectorial { radii: [f64; 2], angles: [f64; 2] },
}

impl SelectionShape {
    pub fn kind(&self) -> SelectionKind {
        match self {
            SelectionShape::Point => SelectionKind::Point,
            SelectionShape::Axial { .. } => SelectionKind::Axial,
            SelectionShape::Linear { .. } => SelectionKind::Linear,
            SelectionShape::Rectangular { .. } => SelectionKind::Rectangular,
            SelectionShape::Polygonal { .. } => SelectionKind::Polygonal,
            SelectionShape::Circular { .. } => SelectionKind::Circular,
            SelectionShape::Elliptical { .. } => SelectionKind::Elliptical,
            SelectionShape::Sectorial { .. } => SelectionKind::Sectorial,
        }
    }

    fn validate(&self) -> PlotResult<()> {
        fn finite(values: &[f64]) -> bool {
            values.iter().all(|v| v.is_finite())
        }

        let ok = match self {
            SelectionShape::Point => true,
            SelectionShape::Axial { length, .. } => length.is_finite(),
            SelectionShape::Linear { length, angle } => {
                finite(&[*length, *angle]) && *length >= 0.0
            }
            SelectionShape::Rectangular { lengths, angle } => {
                finite(&[lengths[0], lengths[1], *angle])
                    && lengths[0] >= 0.0
                    && lengths[1] >= 0.0
            }
            SelectionShape::Polygonal { points, .. } => {
                !points.is_empty() && points.iter().all(|p| finite(p.as_slice()))
            }
            SelectionShape::Circular { radius } => radius.is_finite() && *radius >= 0.0,
            SelectionShape::Elliptical { semi_axes, angle } => {
                finite(&[semi_axes[0], semi_axes[1], *angle])
                    && semi_axes[0] >= 0.0
                    && semi_axes[1] >= 0.0
            }
            SelectionShape::Sectorial { radii, angles } => {
                finite(&[radii[0], radii[1], angles[0], angles[1]])
                    && radii[0] >= 0.0
                    && radii[0] <= radii[1]
            }
        };
        if ok {
            Ok(())
        } else {
            Err(PlotError::InvalidSelection {
                message: format!("invalid {} geometry: {:?}", self.kind(), self),
            })
        }
    }
}

/// Fields that may change without touching geometry
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionStyle {
    pub name: String,
    pub colour: Option<String>,
    pub alpha: f64,
    pub fixed: bool,
}

impl Default for SelectionStyle {
    fn default() -> Self {
        Self {
            name: String::new(),
            colour: None,
            alpha: DEFAULT_ALPHA,
            fixed: false,
        }
    }
}

impl SelectionStyle {
    fn validate(&self) -> PlotResult<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(PlotError::InvalidSelection {
                message: format!("alpha {} is outside [0, 1]", self.alpha),
            });
        }
        Ok(())
    }
}

/// Partial style change; `None` leaves a field as it is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleUpdate {
    pub name: Option<String>,
    pub colour: Option<Option<String>>,
    pub alpha: Option<f64>,
    pub fixed: Option<bool>,
}

impl StyleUpdate {
    pub fn apply(&self, style: &SelectionStyle) -> PlotResult<SelectionStyle> {
        let updated = SelectionStyle {
            name: self.name.clone().unwrap_or_else(|| style.name.clone()),
            colour: self.colour.clone().unwrap_or_else(|| style.colour.clone()),
            alpha: self.alpha.unwrap_or(style.alpha),
            fixed: self.fixed.unwrap_or(style.fixed),
        };
        updated.validate()?;
        Ok(updated)
    }
}

/// A geometric region annotated on a plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireSelection", into = "WireSelection")]
pub struct SelectionDescriptor {
    pub id: String,
    pub start: Point2,
    pub shape: SelectionShape,
    pub style: SelectionStyle,
}

impl SelectionDescriptor {
    pub fn new(id: impl Into<String>, start: Point2, shape: SelectionShape) -> PlotResult<Self> {
        let descriptor = Self {
            id: id.into(),
            start,
            shape,
            style: SelectionStyle::default(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn kind(&self) -> SelectionKind {
        self.shape.kind()
    }

    pub fn with_style(mut self, style: SelectionStyle) -> PlotResult<Self> {
        style.validate()?;
        self.style = style;
        Ok(self)
    }

    pub fn validate(&self) -> PlotResult<()> {
        if self.id.is_empty() {
            return Err(PlotError::InvalidSelection {
                message: "selection id is empty".to_string(),
            });
        }
        if !self.start.iter().all(|v| v.is_finite()) {
            return Err(PlotError::InvalidSelection {
                message: format!("start {:?} is not finite", self.start),
            });
        }
        self.style.validate()?;
        self.shape.validate()
    }
}

/// Flat wire form of a selection
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireSelection {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    colour: Option<String>,
    #[serde(default = "default_alpha")]
    alpha: f64,
    #[serde(default)]
    fixed: bool,
    #[serde(default)]
    start: Option<Point2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimension: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lengths: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points: Option<Vec<Point2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    closed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    semi_axes: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radii: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    angles: Option<[f64; 2]>,
}

fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}

impl WireSelection {
    fn shape(&self) -> PlotResult<SelectionShape> {
        let missing = |field: &str, kind: SelectionKind| PlotError::InvalidSelection {
            message: format!("{kind} selection is missing `{field}`"),
        };
        let angle = self.angle.unwrap_or(0.0);

        let shape = if let Some(dimension) = self.dimension {
            let dimension = Axis::from_index(dimension).ok_or_else(|| PlotError::InvalidSelection {
                message: format!("axial dimension {dimension} is not 0 or 1"),
            })?;
            let length = self
                .length
                .ok_or_else(|| missing("length", SelectionKind::Axial))?;
            SelectionShape::Axial { length, dimension }
        } else if let Some(length) = self.length {
            SelectionShape::Linear { length, angle }
        } else if let Some(lengths) = self.lengths {
            SelectionShape::Rectangular { lengths, angle }
        } else if let Some(points) = &self.points {
            SelectionShape::Polygonal {
                points: points.clone(),
                closed: self.closed.unwrap_or(false),
            }
        } else if let Some(semi_axes) = self.semi_axes {
            SelectionShape::Elliptical { semi_axes, angle }
        } else if let Some(radius) = self.radius {
            SelectionShape::Circular { radius }
        } else if let Some(radii) = self.radii {
            let angles = self
                .angles
                .ok_or_else(|| missing("angles", SelectionKind::Sectorial))?;
            SelectionShape::Sectorial { radii, angles }
        } else {
            SelectionShape::Point
        };
        Ok(shape)
    }
}

impl TryFrom<WireSelection> for SelectionDescriptor {
    type Error = PlotError;

    fn try_from(wire: WireSelection) -> Result<Self, Self::Error> {
        let shape = wire.shape()?;
        let start = match (&wire.start, &shape) {
            (Some(start), _) => *start,
            (None, SelectionShape::Polygonal { points, .. }) if !points.is_empty() => points[0],
            _ => {
                return Err(PlotError::InvalidSelection {
                    message: format!("{} selection is missing `start`", shape.kind()),
                })
            }
        };
        let descriptor = SelectionDescriptor {
            id: wire.id.unwrap_or_else(new_selection_id),
            start,
            shape,
            style: SelectionStyle {
                name: wire.name,
                colour: wire.colour,
                alpha: wire.alpha,
                fixed: wire.fixed,
            },
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

impl From<SelectionDescriptor> for WireSelection {
    fn from(selection: SelectionDescriptor) -> Self {
        let mut wire = WireSelection {
            id: Some(selection.id),
            name: selection.style.name,
            colour: selection.style.colour,
            alpha: selection.style.alpha,
            fixed: selection.style.fixed,
            start: Some(selection.start),
            angle: None,
            dimension: None,
            length: None,
            lengths: None,
            points: None,
            closed: None,
            semi_axes: None,
            radius: None,
            radii: None,
            angles: None,
        };
        match selection.shape {
            SelectionShape::Point => {}
            SelectionShape::Axial { length, dimension } => {
                wire.length = Some(length);
                wire.dimension = Some(dimension.index() as u8);
            }
            SelectionShape::Linear { length, angle } => {
                wire.length = Some(length);
                wire.angle = Some(angle);
            }
            SelectionShape::Rectangular { lengths, angle } => {
                wire.lengths = Some(lengths);
                wire.angle = Some(angle);
            }
            SelectionShape::Polygonal { points, closed } => {
                wire.points = Some(points);
                wire.closed = Some(closed);
            }
            SelectionShape::Circular { radius } => wire.radius = Some(radius),
            SelectionShape::Elliptical { semi_axes, angle } => {
                wire.semi_axes = Some(semi_axes);
                wire.angle = Some(angle);
            }
            SelectionShape::Sectorial { radii, angles } => {
                wire.radii = Some(radii);
                wire.angles = Some(angles);
            }
        }
        wire
    }
}
