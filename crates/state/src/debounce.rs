//! Trailing-edge call coalescing.

use tokio::sync::mpsc;

/// Coalesces bursts of calls into one delayed invocation.
///
/// Each trigger stores its argument and (re)arms the timer; when the
/// interval elapses with no further trigger, the sink fires once with the
/// last argument. Independent debouncers do not interfere. Dropping the
/// debouncer cancels any pending invocation.
pub struct Debouncer<T: Send + 'static> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F>(interval: std::time::Duration, mut sink: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        tokio::spawn(async move {
            'outer: while let Some(mut last) = rx.recv().await {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            sink(last);
                            break;
                        }
                        next = rx.recv() => match next {
                            Some(value) => last = value,
                            // Sender dropped mid-burst: cancel without firing.
                            None => break 'outer,
                        }
                    }
                }
            }
        });
        Self { tx }
    }

    /// Schedule an invocation with this argument.
    pub fn trigger(&self, arg: T) {
        let _ = self.tx.send(arg);
    }
}

impl<T: Send + 'static> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}
