//! Ordered threshold tables.
//!
//! Each heuristic tier (eye-to-face ratio, eye openness, face size, learner
//! capacity) is a [`RangeTable`]: rows are tested in order and the first band
//! containing the value wins, otherwise the fallback applies.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    /// `value < bound`
    Below(f64),
    /// `low <= value <= high`
    Within(f64, f64),
    /// `value > bound`
    Above(f64),
}

impl Band {
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Band::Below(bound) => value < bound,
            Band::Within(low, high) => low <= value && value <= high,
            Band::Above(bound) => value > bound,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RangeTable<T: Copy + 'static> {
    rows: &'static [(Band, T)],
    fallback: T,
}

impl<T: Copy + 'static> RangeTable<T> {
    pub const fn new(rows: &'static [(Band, T)], fallback: T) -> Self {
        Self { rows, fallback }
    }

    /// First matching row's value; NaN never matches a band.
    pub fn lookup(&self, value: f64) -> T {
        self.rows
            .iter()
            .find(|(band, _)| band.contains(value))
            .map(|(_, out)| *out)
            .unwrap_or(self.fallback)
    }
}
