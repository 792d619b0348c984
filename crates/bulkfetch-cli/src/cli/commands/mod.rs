//! CLI command handlers, one file per command.

mod forbidden;
mod login;
mod run;

pub use forbidden::run_forbidden;
pub use login::run_login;
pub use run::{run_download, RunArgs};
