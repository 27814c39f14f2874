//! Embassy tasks

mod link;
mod settings;

pub use link::{link_rx_task, link_tx_task};
pub use settings::{settings_task, Store};
