pub mod diff_cmd;
pub mod export_cmd;
pub mod import_cmd;
pub mod inspect_cmd;
pub mod metadata_cmd;
pub mod read_cmd;
pub mod stats_cmd;
pub mod verify_cmd;

pub use diff_cmd::cmd_diff;
pub use export_cmd::cmd_export;
pub use import_cmd::{cmd_import, ImportArgs};
pub use inspect_cmd::cmd_inspect;
pub use metadata_cmd::cmd_metadata;
pub use read_cmd::{cmd_read, ReadArgs};
pub use stats_cmd::cmd_stats;
pub use verify_cmd::cmd_verify;
