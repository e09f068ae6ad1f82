use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use faultline_core::protocol::{EventPayload, SessionPayload};
use faultline_core::{faultline_debug, DeliveryCallback, DeliveryError};

use super::ratelimit::RateLimiter;

/// How many payloads may wait for the worker.
const QUEUE_SIZE: usize = 30;

/// A payload handed to the worker.
pub enum Payload {
    Event(EventPayload),
    Session(SessionPayload),
}

enum Task {
    Send(Payload, DeliveryCallback),
    Flush(SyncSender<()>),
    Shutdown,
}

pub struct TransportThread {
    debug: bool,
    sender: SyncSender<Task>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TransportThread {
    /// Spawns the worker.  `debug` turns on diagnostics for skipped and
    /// dropped payloads.
    pub fn new<SendFn>(debug: bool, mut send: SendFn) -> Self
    where
        SendFn: FnMut(Payload, &mut RateLimiter) -> Result<(), DeliveryError> + Send + 'static,
    {
        let (sender, receiver) = sync_channel(QUEUE_SIZE);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_worker = shutdown.clone();
        let handle = thread::Builder::new()
            .name("faultline-transport".into())
            .spawn(move || {
                let mut rl = RateLimiter::new();

                for task in receiver.into_iter() {
                    if shutdown_worker.load(Ordering::SeqCst) {
                        return;
                    }
                    let (payload, callback) = match task {
                        Task::Send(payload, callback) => (payload, callback),
                        Task::Flush(sender) => {
                            sender.send(()).ok();
                            continue;
                        }
                        Task::Shutdown => {
                            return;
                        }
                    };

                    if let Some(time_left) = rl.is_disabled() {
                        faultline_debug!(
                            debug,
                            "Skipping send because we're disabled due to rate limits for {}s",
                            time_left.as_secs()
                        );
                        callback(Err(DeliveryError::Transport(format!(
                            "rate limited for {}s",
                            time_left.as_secs()
                        ))));
                        continue;
                    }
                    callback(send(payload, &mut rl));
                }
            })
            .ok();

        Self {
            debug,
            sender,
            shutdown,
            handle,
        }
    }

    /// Queues a payload without blocking.
    ///
    /// A full queue fails the delivery with [`DeliveryError::QueueFull`].
    pub fn send(&self, payload: Payload, callback: DeliveryCallback) {
        match self.sender.try_send(Task::Send(payload, callback)) {
            Ok(()) => {}
            Err(TrySendError::Full(Task::Send(_, callback))) => {
                faultline_debug!(self.debug, "Transport queue is full, dropping payload");
                callback(Err(DeliveryError::QueueFull));
            }
            Err(TrySendError::Disconnected(Task::Send(_, callback))) => {
                callback(Err(DeliveryError::Transport(
                    "transport thread is not running".into(),
                )));
            }
            Err(_) => {}
        }
    }

    pub fn flush(&self, timeout: Duration) -> bool {
        let (sender, receiver) = sync_channel(1);
        if self.sender.send(Task::Flush(sender)).is_err() {
            return true;
        }
        receiver.recv_timeout(timeout).is_ok()
    }
}

impl Drop for TransportThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.sender.send(Task::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                faultline_debug!(self.debug, "Transport thread panicked");
            }
        }
    }
}
