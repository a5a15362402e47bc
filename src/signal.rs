use crate::server::ShutdownHandle;
use log::{debug, warn};
use std::{
    process,
    sync::atomic::{AtomicU8, Ordering},
    thread::{self, sleep},
    time::Duration,
};

/// Stops the server on a termination signal.
///
/// On the first signal the server stops accepting requests and the running
/// deliveries can finish. On the second one the process exits immediately.
pub struct SignalHandler<F: Fn() + Send + 'static> {
    on_shutdown: F,
    signal_count: AtomicU8,
}

impl<F: Fn() + Send + 'static> SignalHandler<F> {
    pub fn new(on_shutdown: F) -> Self {
        SignalHandler {
            on_shutdown,
            signal_count: AtomicU8::new(0),
        }
    }

    /// Process the signals, returns true if the shutdown was initiated.
    fn handle_signals<I>(&self, signals: I) -> bool
    where
        I: IntoIterator<Item = i32>,
    {
        let mut shutdown = false;
        for signal in signals {
            let previous = self.signal_count.fetch_add(1, Ordering::AcqRel);
            if previous == 0 {
                debug!("Got signal {signal}, terminating after the running requests finished.");
                (self.on_shutdown)();
                shutdown = true;
            } else {
                // Allow a little time for the clean shutdown to still happen.
                sleep(Duration::from_millis(100));
                debug!("Got signal {signal}, terminating right now.");
                process::exit(signal);
            }
        }
        shutdown
    }
}

/// Listen to the termination signals in the background and stop the server on them.
#[cfg(unix)]
pub fn shutdown_on_signals(handle: ShutdownHandle) {
    use signal_hook::{
        consts::TERM_SIGNALS,
        iterator::{exfiltrator::SignalOnly, SignalsInfo},
    };

    match SignalsInfo::<SignalOnly>::new(TERM_SIGNALS) {
        Ok(mut signals) => {
            let handler = SignalHandler::new(move || handle.shutdown());
            thread::spawn(move || {
                handler.handle_signals(&mut signals);
            });
        }
        Err(err) => warn!("Failed setting up signal handler: {err}."),
    }
}

#[cfg(not(unix))]
pub fn shutdown_on_signals(_handle: ShutdownHandle) {
    debug!("Signal handlers are not supported on non-unix systems.");
}
