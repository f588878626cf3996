use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::error::{MessagingError, Result};
use crate::storage::{Document, SnapshotStream};

/// Live projection of a store query.
///
/// Yields one full value per store snapshot. After [`Subscription::unsubscribe`]
/// the stream ends and the underlying watch is released; a new subscription
/// has to be created to resume.
pub struct Subscription<T> {
    inner: Option<BoxStream<'static, Result<T>>>,
}

impl<T: Send + 'static> Subscription<T> {
    pub(crate) fn new<F>(snapshots: SnapshotStream, mut project: F) -> Self
    where
        F: FnMut(Vec<Document>) -> Result<T> + Send + 'static,
    {
        let projected = snapshots.map(move |snapshot| match snapshot {
            Ok(docs) => project(docs),
            Err(err) => Err(MessagingError::StoreUnavailable(err)),
        });
        Self {
            inner: Some(projected.boxed()),
        }
    }
}

impl<T> Subscription<T> {
    pub fn unsubscribe(&mut self) {
        if self.inner.take().is_some() {
            log::debug!("Subscription cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut() {
            Some(stream) => stream.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}
