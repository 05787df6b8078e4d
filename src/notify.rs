// notify.rs — 桌面通知
// 通过 notify-send 发送；任何失败都只记日志，不影响调用方

use crate::paths::APP_NAME;
use crate::runner::{CommandRunner, CommandSpec};
use std::env;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Critical,
}

impl Urgency {
    fn as_str(self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str, urgency: Urgency);
}

/// 调用 notify-send 的通知器
pub struct NotifySend<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> NotifySend<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl Notifier for NotifySend<'_> {
    fn notify(&self, title: &str, message: &str, urgency: Urgency) {
        debug!("sending notification '{title}' ({})", urgency.as_str());
        if self.runner.which("notify-send").is_none() {
            warn!("'notify-send' not found, cannot send desktop notifications");
            return;
        }
        // systemd 用户服务里没有 DBUS 地址时通知多半会失败
        if env::var_os("DBUS_SESSION_BUS_ADDRESS").is_none() {
            warn!("DBUS_SESSION_BUS_ADDRESS not set, notification may fail");
        }

        let cmd = CommandSpec::new("notify-send")
            .args(["-a", APP_NAME, "-u", urgency.as_str(), title, message]);
        if let Err(e) = self.runner.run_checked(&cmd) {
            error!("failed to send notification: {e}");
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// 记录所有通知
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, Urgency)>>,
    }

    impl RecordingNotifier {
        pub fn titles(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(t, _, _)| t.clone()).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, message: &str, urgency: Urgency) {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string(), urgency));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::RecordingRunner;

    #[test]
    fn sends_with_app_name_and_urgency() {
        let runner = RecordingRunner::with_tools(&["notify-send"]);
        NotifySend::new(&runner).notify("Wallpaper Updated", "'Bloom'", Urgency::Critical);
        assert_eq!(
            runner.lines(),
            ["notify-send -a ChromaDesk -u critical Wallpaper Updated 'Bloom'"]
        );
    }

    #[test]
    fn missing_tool_is_silent() {
        let runner = RecordingRunner::default();
        NotifySend::new(&runner).notify("t", "m", Urgency::Normal);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn failures_do_not_propagate() {
        let runner = RecordingRunner::with_tools(&["notify-send"]);
        runner.exit_code("notify-send", 1);
        NotifySend::new(&runner).notify("t", "m", Urgency::Normal);
        assert_eq!(runner.calls().len(), 1);
    }
}
