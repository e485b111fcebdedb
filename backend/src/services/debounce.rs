//! Coalescing of bursty events.
//!
//! A [`Debouncer`] owns a background task that receives trigger signals and
//! calls the wrapped function at most once per burst, where a burst ends once
//! no trigger has arrived for `delay`.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which end of a burst fires the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Fire once the burst has gone quiet.
    Trailing,
    /// Fire on the first trigger, suppress the rest of the burst.
    Leading,
}

/// Cheap handle that triggers the debounced function.
#[derive(Debug, Clone)]
pub struct Invoker {
    tx: mpsc::UnboundedSender<()>,
}

impl Invoker {
    /// Returns `false` once the owning [`Debouncer`] has been dropped.
    pub fn call(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Wraps a function so that bursts of calls run it once.
///
/// Must be created inside a Tokio runtime. Dropping the debouncer aborts its
/// task; a pending trailing call is discarded.
#[derive(Debug)]
pub struct Debouncer {
    invoker: Invoker,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Trailing-edge debouncer.
    pub fn new<F>(delay: Duration, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::with_edge(delay, Edge::Trailing, f)
    }

    /// Leading-edge debouncer.
    pub fn leading<F>(delay: Duration, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::with_edge(delay, Edge::Leading, f)
    }

    pub fn with_edge<F>(delay: Duration, edge: Edge, mut f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                if edge == Edge::Leading {
                    f();
                }

                let mut closed = false;
                loop {
                    match tokio::time::timeout(delay, rx.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => {
                            closed = true;
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if edge == Edge::Trailing {
                    f();
                }
                if closed {
                    break;
                }
            }
        });

        Self {
            invoker: Invoker { tx },
            task,
        }
    }

    pub fn call(&self) {
        self.invoker.call();
    }

    /// A cloneable trigger, e.g. for event callbacks.
    pub fn invoker(&self) -> Invoker {
        self.invoker.clone()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
