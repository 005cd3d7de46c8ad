use crate::{clip::AnimationEvent, types::EventReceiver};
use std::sync::mpsc::{channel, Receiver, Sender};

/// Notifications published by an animator
#[derive(Clone, Debug, PartialEq)]
pub enum AnimatorEvent {
    /// A clip ran off its end. Carries the clip name.
    Finished(String),
    /// A tick was processed
    FrameUpdated,
    VisibilityChanged(bool),
    /// A timed clip event was reached
    Event {
        clip: String,
        event: AnimationEvent,
    },
}

/// Subscriber list. Senders whose receiver has been dropped are removed on
/// the next publish.
#[derive(Debug, Default)]
pub struct Observers {
    senders: Vec<Sender<AnimatorEvent>>,
}

impl Observers {
    pub fn subscribe(&mut self) -> Receiver<AnimatorEvent> {
        let (tx, rx) = channel();
        self.senders.push(tx);
        rx
    }

    pub fn publish(&mut self, event: &AnimatorEvent) {
        if self.senders.is_empty() {
            return;
        }
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Sends clip events to subscribers and to an optional direct receiver
pub(super) struct EventFanout<'a> {
    pub observers: &'a mut Observers,
    pub receiver: Option<&'a mut Box<dyn EventReceiver + Send>>,
}

impl EventReceiver for EventFanout<'_> {
    fn receive(&mut self, clip_name: &str, event: &AnimationEvent) {
        if let Some(receiver) = self.receiver.as_mut() {
            receiver.receive(clip_name, event);
        }
        self.observers.publish(&AnimatorEvent::Event {
            clip: clip_name.to_string(),
            event: event.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut observers = Observers::default();
        let kept = observers.subscribe();
        let dropped = observers.subscribe();
        drop(dropped);
        observers.publish(&AnimatorEvent::FrameUpdated);
        assert_eq!(observers.len(), 1);
        assert_eq!(kept.try_recv(), Ok(AnimatorEvent::FrameUpdated));
    }
}
