use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default broadcast capacity for auth events
pub const EVENT_STREAM_CAPACITY: usize = 64;
/// Events kept for late subscribers
pub const EVENT_BUFFER_SIZE: usize = 32;

/// Broadcast stream that also remembers the most recent events
pub struct EventStream<T: Clone + Send + 'static> {
    sender: broadcast::Sender<T>,
    buffer: Arc<Mutex<VecDeque<T>>>,
    buffer_size: usize,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(buffer_size))),
            buffer_size,
        }
    }

    pub fn subscribe(&self) -> Subscriber<T> {
        debug!("New subscriber registered to event stream");
        Subscriber {
            receiver: self.sender.subscribe(),
            buffer: Arc::clone(&self.buffer),
        }
    }

    /// Publish to every live subscriber and buffer for replay.
    ///
    /// Returns the number of subscribers reached; zero is not an error.
    pub fn publish(&self, event: T) -> usize {
        self.buffer_event(event.clone());

        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(receivers, "Event published");
                receivers
            }
            Err(_) => {
                trace!("No receivers for event, message buffered");
                0
            }
        }
    }

    fn buffer_event(&self, event: T) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push_back(event);
            while buffer.len() > self.buffer_size {
                buffer.pop_front();
            }
        }
    }

    /// Events currently held for replay, oldest first
    pub fn recent(&self) -> Vec<T> {
        self.buffer
            .lock()
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl<T: Clone + Send + 'static> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            buffer: Arc::clone(&self.buffer),
            buffer_size: self.buffer_size,
        }
    }
}

/// Subscriber for receiving events from a stream
pub struct Subscriber<T: Clone + Send + 'static> {
    receiver: broadcast::Receiver<T>,
    buffer: Arc<Mutex<VecDeque<T>>>,
}

impl<T: Clone + Send + 'static> Subscriber<T> {
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Replay events from the buffer
    pub fn replay_buffer(&self) -> Vec<T> {
        self.buffer
            .lock()
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }
}
