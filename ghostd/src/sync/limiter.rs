use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tracing::warn;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("scheduled task was aborted before completing")]
    Aborted,
}

/// Admission control for async tasks: at most `max` scheduled tasks run at
/// once, and queued tasks are started in the order they were scheduled.
///
/// A single dispatcher task hands out permits from a fair semaphore, so the
/// limiter must be created inside a tokio runtime. Outside one, every
/// scheduled task resolves to [`LimiterError::Aborted`].
#[derive(Clone)]
pub struct Limiter {
    max: usize,
    slots: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    jobs: mpsc::UnboundedSender<Job>,
}

impl Limiter {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        let slots = Arc::new(Semaphore::new(max));
        let waiting = Arc::new(AtomicUsize::new(0));
        let (jobs, queue) = mpsc::unbounded_channel();
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(dispatch(queue, Arc::clone(&slots), Arc::clone(&waiting)));
            }
            Err(_) => warn!("limiter created outside a tokio runtime; tasks will not run"),
        }
        Self {
            max,
            slots,
            waiting,
            jobs,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn active(&self) -> usize {
        self.max - self.slots.available_permits()
    }

    /// Tasks scheduled but not yet holding a slot.
    pub fn pending(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn schedule<F, T>(&self, task: F) -> Scheduled<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = tx.send(task.await);
        });
        self.waiting.fetch_add(1, Ordering::SeqCst);
        if self.jobs.send(job).is_err() {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
        Scheduled { rx }
    }
}

/// Starts queued jobs one permit at a time. A job's permit is released when
/// its task ends, including by panic or runtime shutdown.
async fn dispatch(
    mut queue: mpsc::UnboundedReceiver<Job>,
    slots: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
) {
    while let Some(job) = queue.recv().await {
        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        waiting.fetch_sub(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let _permit = permit;
            job.await;
        });
    }
}

/// Eventual result of a scheduled task.
pub struct Scheduled<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Scheduled<T> {
    type Output = Result<T, LimiterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| LimiterError::Aborted))
    }
}
