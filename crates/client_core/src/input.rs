//! Gesture normalization: pointer positions on a joystick widget become
//! bounded control vectors.

use shared::{
    domain::{ControlScalar, ControlVector},
    protocol::Command,
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Shape of a joystick widget in its own coordinate space.
///
/// `radius` bounds how far the knob may travel from `center`; `half_extent`
/// is the distance that maps to full deflection. The two differ on widgets
/// whose knob has a visible size, which makes the rim saturate slightly
/// before the knob reaches it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickGeometry {
    center: Point,
    radius: f32,
    half_extent: f32,
}

impl JoystickGeometry {
    pub fn circular(center: Point, radius: f32) -> Self {
        Self {
            center,
            radius,
            half_extent: radius,
        }
    }

    /// Geometry of a square widget of side `size` carrying a knob of side
    /// `knob_size`, with the origin at the widget's top-left corner.
    pub fn from_widget(size: f32, knob_size: f32) -> Self {
        let radius = size / 2.0;
        Self {
            center: Point::new(radius, radius),
            radius,
            half_extent: (size - knob_size) / 2.0,
        }
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn normalize(&self, pointer: Point) -> ControlVector {
        if !self.is_usable() {
            return ControlVector::ZERO;
        }
        let dx = finite_or_zero(pointer.x - self.center.x);
        let dy = finite_or_zero(pointer.y - self.center.y);
        let distance = dx.hypot(dy);

        let (dx, dy) = if distance < self.radius || distance == 0.0 {
            (dx, dy)
        } else {
            let ratio = self.radius / distance;
            (dx * ratio, dy * ratio)
        };

        ControlVector::new(self.unit(dx), self.unit(dy))
    }

    /// Single-axis variant used by the rotation stick; only `x` matters.
    pub fn normalize_axis(&self, pointer_x: f32) -> ControlScalar {
        if !self.is_usable() {
            return ControlScalar::ZERO;
        }
        let dx = finite_or_zero(pointer_x - self.center.x);
        let dx = if dx.abs() < self.radius {
            dx
        } else {
            self.radius.copysign(dx)
        };
        ControlScalar::new(self.unit(dx))
    }

    fn unit(&self, offset: f32) -> f32 {
        (offset / self.half_extent).clamp(-1.0, 1.0)
    }

    fn is_usable(&self) -> bool {
        self.radius.is_finite()
            && self.radius > 0.0
            && self.half_extent.is_finite()
            && self.half_extent > 0.0
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Two-axis drive stick. Every drag yields a move command; the end of a drag
/// yields a single zero move.
#[derive(Debug, Clone)]
pub struct JoystickTracker {
    geometry: JoystickGeometry,
    dragging: bool,
}

impl JoystickTracker {
    pub fn new(geometry: JoystickGeometry) -> Self {
        Self {
            geometry,
            dragging: false,
        }
    }

    pub fn drag(&mut self, pointer: Point) -> Command {
        self.dragging = true;
        Command::Move(self.geometry.normalize(pointer))
    }

    pub fn release(&mut self) -> Option<Command> {
        std::mem::take(&mut self.dragging).then_some(Command::Move(ControlVector::ZERO))
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}

/// Horizontal rotation stick.
#[derive(Debug, Clone)]
pub struct AxisTracker {
    geometry: JoystickGeometry,
    dragging: bool,
}

impl AxisTracker {
    pub fn new(geometry: JoystickGeometry) -> Self {
        Self {
            geometry,
            dragging: false,
        }
    }

    pub fn drag(&mut self, pointer_x: f32) -> Command {
        self.dragging = true;
        Command::Rotate(self.geometry.normalize_axis(pointer_x))
    }

    pub fn release(&mut self) -> Option<Command> {
        std::mem::take(&mut self.dragging).then_some(Command::Rotate(ControlScalar::ZERO))
    }
}
