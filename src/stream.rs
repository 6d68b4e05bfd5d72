use std::sync::mpsc;

/// Error returned by stream endpoints.
///
/// A disconnect can only be observed when the peer endpoint was dropped before
/// the agreed number of samples was exchanged; well-formed producers and
/// consumers never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The other endpoint of the stream was dropped.
    #[error("stream disconnected: the peer endpoint was dropped")]
    Disconnected,
}

/// The producing endpoint of a stream.
pub struct StreamWriter<T> {
    sender: mpsc::SyncSender<T>,
}

/// The consuming endpoint of a stream.
pub struct StreamReader<T> {
    receiver: mpsc::Receiver<T>,
}

/// Creates a bounded FIFO stream, returning its two endpoints.
///
/// The stream is single-producer single-consumer by construction: neither
/// endpoint can be cloned. Ordering is strictly FIFO, the nth value written is
/// the nth value read. `capacity` bounds the number of in-flight values; it
/// affects only how much the producer may run ahead, never the values.
pub fn channel<T>(capacity: usize) -> (StreamWriter<T>, StreamReader<T>) {
    let (sender, receiver) = mpsc::sync_channel(capacity);
    (StreamWriter { sender }, StreamReader { receiver })
}

impl<T> StreamWriter<T> {
    /// Appends a value, blocking the calling thread while the stream is full.
    pub fn write(&self, value: T) -> Result<(), StreamError> {
        self.sender
            .send(value)
            .map_err(|_| StreamError::Disconnected)
    }
}

impl<T> StreamReader<T> {
    /// Removes and returns the oldest value, blocking the calling thread
    /// while the stream is empty.
    pub fn read(&self) -> Result<T, StreamError> {
        self.receiver.recv().map_err(|_| StreamError::Disconnected)
    }

    /// Iterates over incoming values until the writer is dropped.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.receiver.iter()
    }
}
