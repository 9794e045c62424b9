use serde::{Deserialize, Serialize};

/// Identifier of a light inside the bridge's entertainment addressing space.
pub type LightId = u16;

/// One light's target color at a point in time.
///
/// Channels are raw 16-bit values; nothing is clamped or validated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorUpdate {
    pub light_id: LightId,
    /// R, G, B in that order.
    pub color: [u16; 3],
}

impl ColorUpdate {
    pub fn new(light_id: LightId, color: [u16; 3]) -> Self {
        Self { light_id, color }
    }

    pub fn red(&self) -> u16 {
        self.color[0]
    }

    pub fn green(&self) -> u16 {
        self.color[1]
    }

    pub fn blue(&self) -> u16 {
        self.color[2]
    }
}
