use log::info;

/// Receives the human-readable notices produced by a pass.
pub trait NotificationSink {
    fn notify(&self, message: &str);
}

/// Prints notices to stdout and mirrors them to the log.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier {
    quiet: bool,
}

impl LogNotifier {
    /// A quiet notifier only logs; nothing is printed to stdout.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl NotificationSink for LogNotifier {
    fn notify(&self, message: &str) {
        info!("notice: {message}");
        if !self.quiet {
            println!("{message}");
        }
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for &T {
    fn notify(&self, message: &str) {
        (**self).notify(message);
    }
}
