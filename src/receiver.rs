//! Stream receivers for streamed object reads.
//!
//! A streamed read first hands the receiver the object's metadata, then
//! every body chunk as it arrives, then either `finish` or `on_error`.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::Error;
use crate::types::ResponseMetadata;

/// Writable sink a streamed read drains into.
#[async_trait]
pub trait StreamReceiver: Send {
    /// Called once with the response metadata, before any chunk.
    async fn on_meta(&mut self, _meta: &ResponseMetadata) -> Result<(), Error> {
        Ok(())
    }

    /// Write one body chunk.
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error>;

    /// Called once if the read fails, whatever the cause.
    async fn on_error(&mut self, _error: &Error) {}

    /// Called once after the last chunk.
    async fn finish(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[async_trait]
impl StreamReceiver for Vec<u8> {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.extend_from_slice(chunk);
        Ok(())
    }
}

/// Receiver writing into any [`AsyncWrite`] (a file, a socket, ...).
#[derive(Debug)]
pub struct SinkReceiver<W> {
    writer: W,
    meta: Option<ResponseMetadata>,
    error: Option<Error>,
}

impl<W> SinkReceiver<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            meta: None,
            error: None,
        }
    }

    /// Get the metadata seen so far.
    #[must_use]
    pub fn meta(&self) -> Option<&ResponseMetadata> {
        self.meta.as_ref()
    }

    /// Get the error the read failed with, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> StreamReceiver for SinkReceiver<W> {
    async fn on_meta(&mut self, meta: &ResponseMetadata) -> Result<(), Error> {
        self.meta = Some(meta.clone());
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.writer
            .write_all(chunk)
            .await
            .map_err(|e| Error::Http(format!("Failed to write to sink: {e}")))
    }

    async fn on_error(&mut self, error: &Error) {
        self.error = Some(error.clone());
    }

    async fn finish(&mut self) -> Result<(), Error> {
        self.writer
            .flush()
            .await
            .map_err(|e| Error::Http(format!("Failed to flush sink: {e}")))
    }
}

/// Event delivered by a [`ChannelReceiver`].
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Meta(ResponseMetadata),
    Data(Vec<u8>),
    Error(Error),
    End,
}

/// Receiver forwarding every event into a bounded channel.
#[derive(Debug)]
pub struct ChannelReceiver {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelReceiver {
    /// Create a receiver and the channel end its events arrive on.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    async fn send(&self, event: StreamEvent) -> Result<(), Error> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Http("stream receiver closed".to_string()))
    }
}

#[async_trait]
impl StreamReceiver for ChannelReceiver {
    async fn on_meta(&mut self, meta: &ResponseMetadata) -> Result<(), Error> {
        self.send(StreamEvent::Meta(meta.clone())).await
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.send(StreamEvent::Data(chunk.to_vec())).await
    }

    async fn on_error(&mut self, error: &Error) {
        let _ = self.send(StreamEvent::Error(error.clone())).await;
    }

    async fn finish(&mut self) -> Result<(), Error> {
        self.send(StreamEvent::End).await
    }
}
