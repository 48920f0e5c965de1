// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - signal handling and leader election config

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    /// Test that SIGTERM signal handler can be created on Unix platforms
    #[tokio::test]
    #[cfg(unix)]
    async fn test_sigterm_signal_handler_creation() {
        use tokio::signal::unix::{signal, SignalKind};

        let result = signal(SignalKind::terminate());
        assert!(
            result.is_ok(),
            "Should be able to create SIGTERM signal handler"
        );
    }

    /// Test that SIGINT (Ctrl+C) signal handler can be set up
    #[tokio::test]
    async fn test_sigint_handler_exists() {
        let ctrl_c_future = tokio::signal::ctrl_c();

        // We expect a timeout since no signal is actually sent.
        let result = timeout(StdDuration::from_millis(100), ctrl_c_future).await;
        assert!(
            result.is_err(),
            "ctrl_c() future should timeout when no signal is sent"
        );
    }

    /// Test that signal handling works with `tokio::select!`
    #[tokio::test]
    async fn test_select_with_signal_and_task() {
        use tokio::sync::oneshot;

        let (tx, rx) = oneshot::channel::<()>();

        let result = tokio::select! {
            _ = async {
                tokio::time::sleep(StdDuration::from_millis(10)).await;
                Ok::<(), anyhow::Error>(())
            } => {
                "signal"
            }

            _ = async {
                tokio::time::sleep(StdDuration::from_secs(10)).await;
                rx.await
            } => {
                "task"
            }
        };

        assert_eq!(
            result, "signal",
            "select! should complete on signal branch first"
        );

        drop(tx);
    }

    /// Leadership monitor returns when the watch flips to false
    #[tokio::test]
    async fn test_monitor_leadership_returns_on_loss() {
        let (tx, rx) = tokio::sync::watch::channel(true);

        let monitor = crate::monitor_leadership(rx);
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            let _ = tx.send(false);
        });

        let result = timeout(StdDuration::from_secs(1), monitor).await;
        assert!(result.is_ok(), "monitor should return once leadership is lost");
    }
}
