/// Change in the "should acquire chart data" signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChange {
    Opened,
    Closed,
    Unchanged,
}

/// Combines page visibility with the graph section and window selection.
///
/// Acquisition only runs while the page is visible, the graphs section is
/// expanded, and a chart window other than "off" is selected. Timers in a
/// hidden page fire late, which would leave gaps in a fixed-step window, so
/// the cluster chart pauses instead of trying to catch up.
#[derive(Debug, Clone)]
pub struct VisibilityGate {
    page_visible: bool,
    section_open: bool,
    window_enabled: bool,
}

impl VisibilityGate {
    pub fn new(section_open: bool, window_enabled: bool) -> Self {
        VisibilityGate {
            page_visible: true,
            section_open,
            window_enabled,
        }
    }

    pub fn should_acquire(&self) -> bool {
        self.page_visible && self.section_open && self.window_enabled
    }

    pub fn page_visible(&self) -> bool {
        self.page_visible
    }

    pub fn set_page_visible(&mut self, visible: bool) -> GateChange {
        self.update(|gate| gate.page_visible = visible)
    }

    pub fn set_section_open(&mut self, open: bool) -> GateChange {
        self.update(|gate| gate.section_open = open)
    }

    pub fn set_window_enabled(&mut self, enabled: bool) -> GateChange {
        self.update(|gate| gate.window_enabled = enabled)
    }

    fn update(&mut self, apply: impl FnOnce(&mut Self)) -> GateChange {
        let before = self.should_acquire();
        apply(self);
        match (before, self.should_acquire()) {
            (false, true) => GateChange::Opened,
            (true, false) => GateChange::Closed,
            _ => GateChange::Unchanged,
        }
    }
}
