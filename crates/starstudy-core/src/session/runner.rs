use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

use super::SessionTimer;
use crate::events::Event;

type CancelReply = oneshot::Sender<Option<Event>>;

/// Drives a running [`SessionTimer`] on a tokio interval.
///
/// Events go out on the channel given to [`SessionRunner::spawn`], each
/// carrying the session id. The task stops on completion, on
/// [`SessionRunner::cancel`], and when the runner is dropped, so a runner
/// that goes out of scope can never deliver a late completion.
#[derive(Debug)]
pub struct SessionRunner {
    session_id: String,
    child_id: String,
    cancel: Option<oneshot::Sender<CancelReply>>,
    task: JoinHandle<()>,
}

impl SessionRunner {
    /// `timer` must already be started.
    pub fn spawn(timer: SessionTimer, period: Duration, events: mpsc::UnboundedSender<Event>) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let session_id = timer.session_id().to_string();
        let child_id = timer.child_id().to_string();
        let task = tokio::spawn(drive(timer, period, cancel_rx, events));
        Self {
            session_id,
            child_id,
            cancel: Some(cancel_tx),
            task,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn child_id(&self) -> &str {
        &self.child_id
    }

    /// Stop the countdown. Returns the `SessionCancelled` event, or
    /// `None` if the task had already finished, in which case its
    /// completion may still be waiting on the channel.
    pub async fn cancel(&mut self) -> Option<Event> {
        let request = self.cancel.take()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        request.send(reply_tx).ok()?;
        reply_rx.await.ok().flatten()
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive(
    mut timer: SessionTimer,
    period: Duration,
    mut cancel: oneshot::Receiver<CancelReply>,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            request = &mut cancel => {
                let event = timer.cancel();
                if let Ok(reply) = request {
                    let _ = reply.send(event);
                }
                debug!(session_id = %timer.session_id(), "session runner stopped");
                return;
            }
            _ = ticker.tick() => match timer.tick() {
                Some(event @ Event::SessionCompleted { .. }) => {
                    debug!(session_id = %timer.session_id(), "session completed");
                    let _ = events.send(event);
                    return;
                }
                Some(event) => {
                    if events.send(event).is_err() {
                        return;
                    }
                }
                None => return,
            },
        }
    }
}
