use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Screen split into the focused view and the bottom status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutAreas {
    pub view: Rect,
    pub status_bar: Rect,
}

#[derive(Debug, Default)]
pub struct AppLayout;

impl AppLayout {
    pub fn compute(&self, area: Rect) -> LayoutAreas {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);

        LayoutAreas {
            view: chunks[0],
            status_bar: chunks[1],
        }
    }
}
