//! Detector output shapes: per-proposal class, score, and geometry.

/// A box in some coordinate space, `(x0, y0)`–`(x1, y1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Center point `((x0+x1)/2, (y0+y1)/2)`.
    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }
}

/// Whether a detected class is a protected entity, a shoot target, or
/// unmapped. Classification is data-driven by the detector's
/// class-index ordering: classes `0..protected_count` are protected,
/// `protected_count..protected_count+target_count` are targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionClass {
    Protected(u32),
    Target(u32),
    Unknown,
}

/// The detector's class-index layout: how many leading classes are
/// protected entities, and how many follow as shoot targets.
#[derive(Debug, Clone, Copy)]
pub struct DetectionLayout {
    pub protected_count: u32,
    pub target_count: u32,
}

impl DetectionLayout {
    pub fn classify(&self, class_index: u32) -> DetectionClass {
        if class_index < self.protected_count {
            DetectionClass::Protected(class_index)
        } else if class_index < self.protected_count + self.target_count {
            DetectionClass::Target(class_index - self.protected_count)
        } else {
            DetectionClass::Unknown
        }
    }
}

/// One detector proposal surviving the score threshold.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub class: DetectionClass,
    pub score: f32,
    /// Bounding box in source-image coordinates, for overlay rendering.
    pub box_source: Rect,
    /// Center in model (detector) input coordinates.
    pub center_model: (f32, f32),
}
