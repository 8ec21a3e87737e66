pub mod config;
pub mod endurance_toml;
pub mod fd_limit;
pub mod logger;

pub use config::*;
pub use endurance_toml::{EnduranceToml, apply_file_to_opts, load_settings_toml, parse_settings};
pub use fd_limit::{FDS_PER_WORKER, cap_workers, max_open_fds, max_workers_by_fd_limit};
pub use logger::{Colors, setup_logging};
