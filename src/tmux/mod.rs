mod client;

pub use client::TmuxClient;

use crate::process::Pid;

/// A tmux pane and the root of its process tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    /// Owning session name
    pub session: String,
    /// Window index within the session (e.g., "1")
    pub window_index: String,
    /// Window ID (e.g., "@3")
    pub window_id: String,
    /// Pane ID (e.g., "%7")
    pub pane_id: String,
    /// Pid of the pane's root process, usually a shell
    pub pid: Pid,
}

impl Pane {
    /// Key used for per-window totals
    pub fn window_key(&self) -> String {
        format!("{}:{}", self.session, self.window_index)
    }
}
