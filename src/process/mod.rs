mod forest;
mod sampler;

pub use forest::{build_children_index, descendants, list_parents};
pub use sampler::sample_memory;

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Operating system process id
pub type Pid = u32;

/// Memory in megabytes per pid, fresh for each sample
pub type Measurement = HashMap<Pid, f64>;

/// pid -> parent pid
pub type ParentMap = HashMap<Pid, Pid>;

/// pid -> direct children. A pid with no entry has no children.
pub type ChildrenIndex = HashMap<Pid, Vec<Pid>>;

/// Run an external tool and return its stdout.
///
/// Spawn failures, non-zero exits and timeouts all yield `None`; callers
/// treat that as an empty listing. The child is killed if the timeout fires.
pub async fn run_capture(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::debug!(program, error = %e, "failed to execute");
            return None;
        }
        Err(_) => {
            tracing::warn!(program, ?timeout, "timed out");
            return None;
        }
    };

    if !output.status.success() {
        tracing::debug!(program, status = %output.status, "exited unsuccessfully");
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}
