//! The inbound event queue.
//!
//! A [`Worker`] owns a single queue in front of a [`Coordinator`]. Lifecycle
//! and control events are processed to completion, one at a time, in arrival
//! order. Fetch events are spawned so independent fetches proceed
//! concurrently; each replies through its own oneshot channel.

use std::sync::Arc;

use shellcache_core::InterceptedRequest;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use crate::control::ControlChannel;
use crate::dispatch::{Coordinator, Event, EventKind, EventOutcome};
use crate::error::{CoordinatorError, WorkerError};
use crate::strategy::FetchOutcome;

type Reply = oneshot::Sender<Result<EventOutcome, CoordinatorError>>;

pub(crate) struct Job {
    pub(crate) event: Event,
    pub(crate) reply: Option<Reply>,
}

/// Handle to a running worker loop.
pub struct Worker {
    sender: mpsc::UnboundedSender<Job>,
    handle: JoinHandle<()>,
    coordinator: Arc<Coordinator>,
}

impl Worker {
    /// Spawns the worker loop on the current tokio runtime.
    pub fn spawn(coordinator: Arc<Coordinator>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(
            run(Arc::clone(&coordinator), receiver).instrument(info_span!("worker")),
        );
        Self {
            sender,
            handle,
            coordinator,
        }
    }

    /// Queues `event` and waits for its outcome.
    pub async fn send(&self, event: Event) -> Result<EventOutcome, WorkerError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Job {
                event,
                reply: Some(reply),
            })
            .map_err(|_| WorkerError::Stopped)?;
        response
            .await
            .map_err(|_| WorkerError::Stopped)?
            .map_err(WorkerError::from)
    }

    /// Queues `event` without waiting.
    pub fn post(&self, event: Event) -> Result<(), WorkerError> {
        self.sender
            .send(Job { event, reply: None })
            .map_err(|_| WorkerError::Stopped)
    }

    /// Installs the configured generation.
    pub async fn install(&self) -> Result<EventOutcome, WorkerError> {
        self.send(Event::Install).await
    }

    /// Promotes the pending generation and sweeps.
    pub async fn activate(&self) -> Result<EventOutcome, WorkerError> {
        self.send(Event::Activate).await
    }

    /// Resolves an intercepted request.
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<FetchOutcome, WorkerError> {
        match self.send(Event::Fetch(request)).await? {
            EventOutcome::Fetched(outcome) => Ok(outcome),
            _ => Err(CoordinatorError::Unhandled(EventKind::Fetch).into()),
        }
    }

    /// A control channel posting onto this worker's queue.
    pub fn control(&self) -> ControlChannel {
        ControlChannel::new(self.sender.clone())
    }

    /// The coordinator behind the queue.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Stops accepting events and waits for queued ones to finish.
    ///
    /// Control channels keep the queue open until they are dropped too.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(error) = self.handle.await {
            warn!(%error, "worker loop ended abnormally");
        }
    }
}

async fn run(coordinator: Arc<Coordinator>, mut receiver: mpsc::UnboundedReceiver<Job>) {
    while let Some(Job { event, reply }) = receiver.recv().await {
        let kind = event.kind();
        if kind == EventKind::Fetch {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(
                async move {
                    let result = coordinator.dispatch(event).await;
                    respond(kind, result, reply);
                }
                .in_current_span(),
            );
        } else {
            let result = coordinator.dispatch(event).await;
            respond(kind, result, reply);
        }
    }
    debug!("event queue closed");
}

fn respond(
    kind: EventKind,
    result: Result<EventOutcome, CoordinatorError>,
    reply: Option<Reply>,
) {
    if let Err(error) = &result {
        warn!(%kind, %error, "event handler failed");
    }
    if let Some(reply) = reply
        && reply.send(result).is_err()
    {
        debug!(%kind, "event outcome dropped, sender went away");
    }
}
