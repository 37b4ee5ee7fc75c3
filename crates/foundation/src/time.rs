/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Time(pub f64); // seconds

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeSpan {
    pub start: Time,
    pub end: Time,
}

impl TimeSpan {
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    pub fn forever() -> Self {
        Self {
            start: Time(f64::NEG_INFINITY),
            end: Time(f64::INFINITY),
        }
    }

    pub fn instant(t: Time) -> Self {
        Self { start: t, end: t }
    }

    pub fn duration(&self) -> f64 {
        (self.end.0 - self.start.0).max(0.0)
    }

    /// Half-open containment: the start is included, the end is not.
    ///
    /// With this convention adjacent spans (the end of one is the start of
    /// the next) never both claim the shared instant, so stepping a clock
    /// across a boundary lands in exactly one span.
    pub fn contains(&self, t: Time) -> bool {
        t.0 >= self.start.0 && t.0 < self.end.0
    }
}
