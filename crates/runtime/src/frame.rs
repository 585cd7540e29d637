/// Per-frame metadata handed to the frame driver.
///
/// Kept small and pure so a session can be recorded and replayed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Fixed delta time (seconds).
    pub dt_s: f64,
    /// Session time at the start of the frame (seconds).
    pub time_s: f64,
}

impl Frame {
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time_s: index as f64 * dt_s,
        }
    }

    pub fn first() -> Self {
        Self::new(0, 1.0 / 60.0)
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt_s)
    }
}
