//! The control channel.
//!
//! The foreground application posts [`ControlMessage`]s and never waits for
//! an answer. Messages join the worker's ordered queue, so a `SKIP_WAITING`
//! posted after an install is handled after that install finished.

use shellcache_core::ControlMessage;
use tokio::sync::mpsc;
use tracing::debug;

use crate::dispatch::Event;
use crate::worker::Job;

/// One-way sender of control messages. Cheap to clone.
#[derive(Clone)]
pub struct ControlChannel {
    sender: mpsc::UnboundedSender<Job>,
}

impl ControlChannel {
    pub(crate) fn new(sender: mpsc::UnboundedSender<Job>) -> Self {
        Self { sender }
    }

    /// Posts a parsed message.
    pub fn post(&self, message: ControlMessage) {
        let command = message.command();
        let job = Job {
            event: Event::Message(message),
            reply: None,
        };
        if self.sender.send(job).is_err() {
            debug!(command = command.as_str(), "worker stopped, control message dropped");
        }
    }

    /// Posts a message in its JSON wire form.
    ///
    /// Unknown message types are ignored; malformed messages are dropped.
    /// Returns whether a message was queued.
    pub fn post_json(&self, raw: &str) -> bool {
        match ControlMessage::from_json(raw) {
            Ok(Some(message)) => {
                self.post(message);
                true
            }
            Ok(None) => false,
            Err(error) => {
                debug!(%error, "malformed control message dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellcache_core::ControlCommand;

    #[test]
    fn test_post_json_filters_messages() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let channel = ControlChannel::new(sender);

        assert!(channel.post_json(r#"{"type":"CLEAR_CACHE"}"#));
        assert!(!channel.post_json(r#"{"type":"PING"}"#));
        assert!(!channel.post_json("{"));

        let job = receiver.try_recv().unwrap();
        assert!(job.reply.is_none());
        assert!(matches!(
            job.event,
            Event::Message(ref m) if m.command() == ControlCommand::ClearCache
        ));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_post_after_worker_stopped_is_silent() {
        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        ControlChannel::new(sender).post(ControlMessage::new(ControlCommand::SkipWaiting));
    }
}
