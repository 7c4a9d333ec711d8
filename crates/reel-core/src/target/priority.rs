//! Render thread scheduling
//!
//! Elevation is best-effort: on Linux it asks for `SCHED_FIFO`, which
//! usually needs `CAP_SYS_NICE` or an rtprio limit. Failure is logged and
//! the thread keeps running at normal priority.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Scheduling class for a target's render thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadPriority {
    #[default]
    Normal,
    /// Elevated, for video targets that should not stutter under load
    High,
    /// Real-time, for audio targets where a late cycle is audible
    TimeCritical,
}

impl ThreadPriority {
    /// Apply to the calling thread
    pub(crate) fn apply(self) {
        if self == ThreadPriority::Normal {
            return;
        }
        match elevate(self) {
            Ok(()) => debug!("render thread priority set to {self:?}"),
            Err(err) => warn!("could not set render thread priority to {self:?}: {err}"),
        }
    }
}

#[cfg(target_os = "linux")]
fn elevate(priority: ThreadPriority) -> Result<(), std::io::Error> {
    let sched_priority = match priority {
        ThreadPriority::Normal => return Ok(()),
        ThreadPriority::High => 10,
        ThreadPriority::TimeCritical => 70,
    };
    let param = libc::sched_param { sched_priority };
    // SAFETY: pthread_self() is the calling thread; param outlives the call.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::from_raw_os_error(rc))
    }
}

#[cfg(not(target_os = "linux"))]
fn elevate(_priority: ThreadPriority) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_never_panics_without_privileges() {
        std::thread::spawn(|| {
            ThreadPriority::TimeCritical.apply();
            ThreadPriority::High.apply();
            ThreadPriority::Normal.apply();
        })
        .join()
        .unwrap();
    }

    #[test]
    fn serializes_lowercase() {
        let yaml = serde_yaml::to_string(&ThreadPriority::TimeCritical).unwrap();
        assert_eq!(yaml.trim(), "timecritical");
    }
}
