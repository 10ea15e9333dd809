use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One automation point: control value `y` from tick position `x` on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub selected: bool,
}

impl Acceleration {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            selected: false,
        }
    }

    pub(crate) fn cmp_x(&self, other: &Acceleration) -> Ordering {
        self.x.total_cmp(&other.x)
    }
}
