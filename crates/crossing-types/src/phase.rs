//! Signal phase of a single traffic light.
//!
//! The phase is a closed set: a light is either showing [`Phase::Stop`]
//! (red) or [`Phase::Go`] (green). There is no amber state and no
//! transition other than flipping between the two.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The signal state of the light.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Red: traffic must wait. Every light starts here.
    #[default]
    Stop,
    /// Green: traffic may proceed.
    Go,
}

impl Phase {
    /// Return the phase that follows this one.
    ///
    /// Stop is always followed by Go and Go by Stop.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Stop => Self::Go,
            Self::Go => Self::Stop,
        }
    }

    /// Whether traffic may proceed in this phase.
    pub const fn is_go(self) -> bool {
        matches!(self, Self::Go)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Go => f.write_str("go"),
        }
    }
}
