//! Byte stream sources feeding the scan driver

use std::fmt::Display;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use super::error::SourceError;

/// Default read buffer for file and stdin sources
pub const DEFAULT_READ_CAPACITY: usize = 8 * 1024;

/// Pull-based supplier of raw body chunks.
///
/// `Ok(None)` is a clean end of stream; `Err` is a transport failure.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, SourceError>;
}

#[async_trait]
impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, SourceError> {
        (**self).next_chunk().await
    }
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, SourceError> {
        Ok(self.chunk().await?)
    }
}

/// Adapter over any fallible stream of byte buffers
pub struct StreamSource<S> {
    stream: S,
}

impl<S> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S, B, E> ChunkSource for StreamSource<S>
where
    S: Stream<Item = Result<B, E>> + Unpin + Send,
    B: Into<Bytes> + Send,
    E: Display + Send,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, SourceError> {
        match self.stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk.into())),
            Some(Err(err)) => Err(SourceError::new(err.to_string())),
            None => Ok(None),
        }
    }
}

/// Chunked source over an async reader (file, stdin)
pub fn reader_source<R>(reader: R, capacity: usize) -> StreamSource<ReaderStream<R>>
where
    R: AsyncRead + Unpin + Send,
{
    StreamSource::new(ReaderStream::with_capacity(reader, capacity.max(1)))
}

/// In-memory source yielding the given chunks in order
pub fn chunked_source(chunks: Vec<Vec<u8>>) -> StreamSource<futures::stream::Iter<std::vec::IntoIter<Result<Vec<u8>, SourceError>>>> {
    let items: Vec<Result<Vec<u8>, SourceError>> = chunks.into_iter().map(Ok).collect();
    StreamSource::new(futures::stream::iter(items))
}
