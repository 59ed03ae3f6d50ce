mod diff_view;
mod help_view;
mod main_view;
mod refs_view;
mod status_view;
mod tree_view;

pub use diff_view::DiffView;
pub use help_view::HelpView;
pub use main_view::MainView;
pub use refs_view::RefsView;
pub use status_view::StatusView;
pub use tree_view::TreeView;

use crate::config::{AppInfo, Config};
use crate::keymap::KeyBindingManager;
use crate::theme::Colors;

use super::view::{Backend, View};

/// One instance of every view, all sharing `backend`
pub fn build_views(
    backend: &Backend,
    config: &Config,
    colors: &Colors,
    keymap: &KeyBindingManager,
    info: &AppInfo,
) -> Vec<Box<dyn View>> {
    vec![
        Box::new(MainView::new(
            backend.clone(),
            colors.clone(),
            config.views.main.clone(),
            config.general.max_commits,
        )),
        Box::new(DiffView::new(backend.clone(), colors.clone())),
        Box::new(StatusView::new(
            backend.clone(),
            colors.clone(),
            config.views.status.clone(),
        )),
        Box::new(TreeView::new(backend.clone(), colors.clone())),
        Box::new(RefsView::new(backend.clone(), colors.clone())),
        Box::new(HelpView::new(colors.clone(), keymap, info.clone())),
    ]
}
