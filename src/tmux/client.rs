use std::time::Duration;

use super::Pane;
use crate::process::{run_capture, Pid};

/// Client for querying tmux via CLI
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
    /// Bound on each tmux invocation
    timeout: Duration,
}

impl TmuxClient {
    pub fn new(tmux_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tmux_path: tmux_path.into(),
            timeout,
        }
    }

    /// List panes across all sessions.
    ///
    /// No server, no sessions, or a failing tmux all yield an empty list.
    pub async fn list_panes(&self) -> Vec<Pane> {
        // Format: session_name\twindow_index\twindow_id\tpane_id\tpane_pid
        let args = [
            "list-panes",
            "-a",
            "-F",
            "#{session_name}\t#{window_index}\t#{window_id}\t#{pane_id}\t#{pane_pid}",
        ];

        match run_capture(&self.tmux_path, &args, self.timeout).await {
            Some(stdout) => parse_panes(&stdout),
            None => {
                tracing::debug!("tmux list-panes returned nothing");
                Vec::new()
            }
        }
    }
}

fn parse_panes(stdout: &str) -> Vec<Pane> {
    stdout.lines().filter_map(parse_pane_line).collect()
}

fn parse_pane_line(line: &str) -> Option<Pane> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 5 {
        return None;
    }

    // Empty during split transitions
    let pid = parts[4].trim().parse::<Pid>().ok()?;

    Some(Pane {
        session: parts[0].to_string(),
        window_index: parts[1].to_string(),
        window_id: parts[2].to_string(),
        pane_id: parts[3].to_string(),
        pid,
    })
}
