//! Progress UI (spinner) for expansion runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the progress spinner when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    done: Arc<AtomicUsize>,
    total: usize,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(done, total, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    done: Arc<AtomicUsize>,
    total: usize,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            spinner.set_message(progress_message(done.load(Ordering::Relaxed), total));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

fn progress_message(done: usize, total: usize) -> String {
    format!("[{}/{}] Expanding URLs...", done.min(total), total)
}

/// Signals the spinner to stop and waits for it to clear the line.
pub(crate) async fn stop_progress_ui(
    handle: Option<tokio::task::JoinHandle<()>>,
    stop: &AtomicBool,
) {
    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = handle {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_progress_ui_disabled_returns_stopped() {
        let (handle, stop) = spawn_progress_ui(false, Arc::new(AtomicUsize::new(0)), 10);
        assert!(handle.is_none());
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_spawn_progress_ui_stops_on_signal() {
        let (handle, stop) = spawn_progress_ui(true, Arc::new(AtomicUsize::new(3)), 10);
        assert!(handle.is_some());
        stop_progress_ui(handle, &stop).await;
        assert!(stop.load(Ordering::SeqCst));
    }

    #[test]
    fn test_progress_message_caps_at_total() {
        assert_eq!(progress_message(3, 10), "[3/10] Expanding URLs...");
        assert_eq!(progress_message(12, 10), "[10/10] Expanding URLs...");
    }
}
