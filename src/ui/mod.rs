pub mod layout;
pub mod scroll;
pub mod view;
pub mod view_manager;
pub mod views;

pub use layout::AppLayout;
pub use view::{Backend, ViewError, ViewType};
pub use view_manager::{Notice, ViewManager};
