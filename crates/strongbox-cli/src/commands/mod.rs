mod account;
mod init;
mod items;
mod misc;
mod transfer;

pub use account::{handle_passwd, handle_reset, handle_status};
pub use init::handle_init;
pub use items::{handle_add, handle_get, handle_list, handle_remove};
pub use misc::handle_completions;
pub use transfer::{handle_export, handle_import};
