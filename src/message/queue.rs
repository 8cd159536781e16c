//! Concurrent FIFO used for a transport's inbound messages.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::message::Message;

#[derive(Debug, Default)]
pub(crate) struct MessageQueue {
    queue: Mutex<VecDeque<Message>>,
}

impl MessageQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, msg: Message) {
        self.queue.lock().push_back(msg);
    }

    pub(crate) fn pull(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.queue.lock().clear();
    }
}
