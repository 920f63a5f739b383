//! Native notification and tone output for fired reminders.

use thiserror::Error;

use super::ReminderNotification;
use crate::storage::{NotificationPermission, NotificationsConfig};

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("no native notifier on this platform")]
    Unsupported,

    #[error("notifier failed to start: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("audio output unavailable: {0}")]
    Audio(String),
}

/// Where fired reminders go besides the in-app toast.
pub trait AlertSink: Send + Sync {
    fn native(&self, notification: &ReminderNotification) -> Result<(), AlertError>;
    fn tone(&self) -> Result<(), AlertError>;
}

/// Show the native notification (when permitted) and play the tone.
/// Failures are logged at debug level and otherwise ignored.
pub fn deliver<A: AlertSink + ?Sized>(
    sink: &A,
    permission: NotificationPermission,
    notification: &ReminderNotification,
) {
    if permission == NotificationPermission::Granted {
        if let Err(e) = sink.native(notification) {
            tracing::debug!(error = %e, "native notification failed");
        }
    }
    if let Err(e) = sink.tone() {
        tracing::debug!(error = %e, "reminder tone failed");
    }
}

pub const TONE_HZ: f32 = 880.0;
pub const TONE_MS: u64 = 200;

/// Desktop notifier backed by `notify-send` or `osascript`, with an
/// 880 Hz tone through the default audio device.
#[derive(Debug, Clone)]
pub struct DesktopAlerts {
    sound: bool,
    volume: f32,
}

impl DesktopAlerts {
    pub fn new(config: &NotificationsConfig) -> Self {
        Self {
            sound: config.sound,
            volume: config.volume.clamp(0.0, 1.0) as f32,
        }
    }
}

fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl AlertSink for DesktopAlerts {
    fn native(&self, notification: &ReminderNotification) -> Result<(), AlertError> {
        let mut cmd = if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {} with title {}",
                applescript_quote(&notification.body),
                applescript_quote(&notification.title)
            );
            let mut cmd = tokio::process::Command::new("osascript");
            cmd.arg("-e").arg(script);
            cmd
        } else if cfg!(all(unix, not(target_os = "macos"))) {
            let mut cmd = tokio::process::Command::new("notify-send");
            cmd.args(["--app-name=TaskFlow", "--urgency=critical"])
                .arg(&notification.title)
                .arg(&notification.body);
            cmd
        } else {
            return Err(AlertError::Unsupported);
        };
        cmd.spawn()?;
        Ok(())
    }

    fn tone(&self) -> Result<(), AlertError> {
        if !self.sound {
            return Ok(());
        }
        play_tone(self.volume)
    }
}

#[cfg(feature = "sound")]
fn play_tone(volume: f32) -> Result<(), AlertError> {
    use rodio::source::{SineWave, Source};
    use rodio::{OutputStream, Sink};
    use std::time::Duration;

    // The output stream is not Send; open and hold it on its own thread.
    std::thread::Builder::new()
        .name("taskflow-tone".into())
        .spawn(move || {
            let (_stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::debug!("Failed to initialize audio output: {}", e);
                    return;
                }
            };
            let sink = match Sink::try_new(&handle) {
                Ok(sink) => sink,
                Err(e) => {
                    tracing::debug!("Failed to create audio sink: {}", e);
                    return;
                }
            };
            sink.append(
                SineWave::new(TONE_HZ)
                    .take_duration(Duration::from_millis(TONE_MS))
                    .amplify(volume),
            );
            sink.sleep_until_end();
        })
        .map(|_| ())
        .map_err(|e| AlertError::Audio(e.to_string()))
}

#[cfg(not(feature = "sound"))]
fn play_tone(_volume: f32) -> Result<(), AlertError> {
    use std::io::Write;

    let mut out = std::io::stderr();
    out.write_all(b"\x07")?;
    out.flush()?;
    Ok(())
}
