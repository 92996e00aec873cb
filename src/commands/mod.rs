use std::fs;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod chat;
pub mod config;
pub mod convert;
pub mod history;
pub mod ocr;
pub mod settings;

/// Writes `body` to `path`, creating missing parent directories.
pub(crate) fn write_output_file(path: &Path, body: &str) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create output directory '{}': {err}",
                parent.display()
            )
        })?;
    }

    fs::write(path, format!("{body}\n"))
        .map_err(|err| format!("Failed to write output file '{}': {err}", path.display()))
}

/// Process-wide Ctrl-C listener.
///
/// Interrupts are queued on a [`Notify`], so one that lands between two
/// waits is still seen by the next one.
pub(crate) struct Interrupts {
    notify: Arc<Notify>,
    forwarder: JoinHandle<()>,
}

impl Interrupts {
    pub(crate) fn listen() -> Self {
        let notify = Arc::new(Notify::new());
        let sender = Arc::clone(&notify);
        let forwarder = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                log::debug!("interrupt received");
                sender.notify_one();
            }
        });
        Self { notify, forwarder }
    }

    pub(crate) async fn recv(&self) {
        self.notify.notified().await;
    }

    /// Cancels `token` on the next interrupt. Abort the handle once the
    /// guarded work ends.
    pub(crate) fn cancel_on_interrupt(&self, token: CancellationToken) -> JoinHandle<()> {
        let notify = Arc::clone(&self.notify);
        tokio::spawn(async move {
            notify.notified().await;
            token.cancel();
        })
    }
}

impl Drop for Interrupts {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}
