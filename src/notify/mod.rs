//! Desktop notification helpers with platform-specific backends.
//!
//! macOS: Notification Center via `mac-notification-sys`.
//! Windows: WinRT Toast via `winrt-notification`.
//! Linux: Freedesktop notifications via `notify-rust`.
//! Other platforms: no-op.

/// Lightweight wrapper around the platform notification backend.
#[derive(Clone)]
pub struct SystemNotifier {
    app_name: String,
}

impl SystemNotifier {
    /// Create a new notifier using the provided application name label.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Fire a fire-and-forget notification. Failures are logged but do not bubble up.
    pub fn notify(&self, title: impl Into<String>, body: impl Into<String>) {
        let app_name = self.app_name.clone();
        let title = title.into();
        let body = body.into();
        std::thread::spawn(move || {
            if let Err(err) = send_notification(&app_name, &title, &body) {
                tracing::warn!(?err, "Failed to send desktop notification");
            }
        });
    }
}

#[cfg(target_os = "macos")]
fn send_notification(app_name: &str, title: &str, body: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    use mac_notification_sys::{Notification, send_notification, set_application};

    if let Err(err) = set_application(app_name) {
        tracing::debug!(?err, "Failed to set macOS notification application");
    }
    send_notification(title, None, body, None::<&Notification>)
        .map(|_| ())
        .with_context(|| "failed to show macOS notification")
}

#[cfg(target_os = "windows")]
fn send_notification(app_name: &str, title: &str, body: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    use winrt_notification::{Duration, Toast};

    Toast::new(app_name)
        .title(title)
        .text1(body)
        .duration(Duration::Short)
        .show()
        .map(|_| ())
        .with_context(|| "failed to show Windows toast notification")
}

#[cfg(target_os = "linux")]
fn send_notification(app_name: &str, title: &str, body: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    use notify_rust::Notification;

    Notification::new()
        .appname(app_name)
        .summary(title)
        .body(body)
        .show()
        .map(|_| ())
        .with_context(|| "failed to show Linux desktop notification")
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn send_notification(_app_name: &str, _title: &str, _body: &str) -> anyhow::Result<()> {
    tracing::debug!("Desktop notifications are not supported on this platform");
    Ok(())
}
