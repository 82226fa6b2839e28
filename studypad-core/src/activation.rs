/// Per-page lazy-activation state, driven by an injected scroll-window
/// signal rather than any platform intersection API so it can be exercised
/// with synthetic geometry.

/// Vertical extent of the visible scroll area, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollWindow {
    pub top: f32,
    pub height: f32,
}

impl ScrollWindow {
    pub fn new(top: f32, height: f32) -> Self {
        Self {
            top,
            height: height.max(0.0),
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

/// Vertical extent one page occupies in the scroll layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBounds {
    pub top: f32,
    pub height: f32,
}

impl PageBounds {
    pub fn new(top: f32, height: f32) -> Self {
        Self {
            top,
            height: height.max(0.0),
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Inactive,
    Active,
}

/// Whether a page intersects the window extended by the lookahead margin,
/// with at least `min_fraction` of the page's height visible inside the
/// extended window.
pub fn intersects_with_lookahead(
    page: PageBounds,
    window: ScrollWindow,
    lookahead_margin: f32,
    min_fraction: f32,
) -> bool {
    if page.height <= 0.0 {
        return false;
    }

    let extended_top = window.top - lookahead_margin;
    let extended_bottom = window.bottom() + lookahead_margin;
    let overlap = page.bottom().min(extended_bottom) - page.top.max(extended_top);
    if overlap <= 0.0 {
        return false;
    }

    overlap / page.height >= min_fraction
}

/// Tracks one page's activation state across repeated visibility reports,
/// surfacing only the transitions.
#[derive(Debug)]
pub struct ActivationTracker {
    state: Activation,
}

impl ActivationTracker {
    pub fn new() -> Self {
        Self {
            state: Activation::Inactive,
        }
    }

    pub fn state(&self) -> Activation {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == Activation::Active
    }

    /// Applies a fresh visibility observation. Returns the new state only
    /// when it changed, so callers react to transitions, not to every
    /// scroll event.
    pub fn observe(&mut self, visible: bool) -> Option<Activation> {
        let next = if visible {
            Activation::Active
        } else {
            Activation::Inactive
        };
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

impl Default for ActivationTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARGIN: f32 = 200.0;
    const MIN_FRACTION: f32 = 0.1;

    #[test]
    fn page_far_below_window_is_not_visible() {
        let window = ScrollWindow::new(0.0, 800.0);
        let page = PageBounds::new(3000.0, 1000.0);
        assert!(!intersects_with_lookahead(page, window, MARGIN, MIN_FRACTION));
    }

    #[test]
    fn page_within_lookahead_margin_is_visible() {
        let window = ScrollWindow::new(0.0, 800.0);
        // Page starts 50px past the window bottom, inside the 200px margin,
        // with 150px (15%) inside the extended window.
        let page = PageBounds::new(850.0, 1000.0);
        assert!(intersects_with_lookahead(page, window, MARGIN, MIN_FRACTION));
    }

    #[test]
    fn sliver_below_min_overlap_stays_inactive() {
        // Extended window is [-200, 1000]; page [950, 1950] overlaps by
        // 50px of its 1000px height: 5%, below the 10% floor.
        let window = ScrollWindow::new(0.0, 800.0);
        let page = PageBounds::new(950.0, 1000.0);
        assert!(!intersects_with_lookahead(page, window, MARGIN, MIN_FRACTION));
    }

    #[test]
    fn ten_percent_overlap_activates() {
        let window = ScrollWindow::new(0.0, 800.0);
        // Extended window ends at 1000; page [900, 1900] has 100px = 10% inside.
        let page = PageBounds::new(900.0, 1000.0);
        assert!(intersects_with_lookahead(page, window, MARGIN, MIN_FRACTION));
        // Shift one pixel further down: 99px = 9.9%, below threshold.
        let page = PageBounds::new(901.0, 1000.0);
        assert!(!intersects_with_lookahead(page, window, MARGIN, MIN_FRACTION));
    }

    #[test]
    fn tracker_reports_only_transitions() {
        let mut tracker = ActivationTracker::new();
        assert_eq!(tracker.state(), Activation::Inactive);

        assert_eq!(tracker.observe(true), Some(Activation::Active));
        assert_eq!(tracker.observe(true), None);
        assert_eq!(tracker.observe(true), None);
        assert_eq!(tracker.observe(false), Some(Activation::Inactive));
        assert_eq!(tracker.observe(false), None);
    }
}
