//! Named pixel positions used to place apertures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A disk or point object at a fixed pixel position. Owns no image data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// Column
    pub x: usize,
    /// Row
    pub y: usize,
}

impl Target {
    pub fn new(name: impl Into<String>, x: usize, y: usize) -> Self {
        Self {
            name: name.into(),
            x,
            y,
        }
    }

    pub fn pos(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    /// Position as an aperture center.
    pub fn center(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }

    /// One-line description, e.g. `"HD 1234 is at (512,498)"`.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is at ({},{})", self.name, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let star = Target::new("Companion", 600, 431);
        assert_eq!(star.describe(), "Companion is at (600,431)");
        assert_eq!(star.pos(), (600, 431));
        assert_eq!(star.center(), (600.0, 431.0));
    }
}
