//! Cancellable, single-consumer completion stream.
//!
//! A [`CompletionStream`] yields answer fragments in arrival order and owns
//! whatever keeps the underlying completion alive (an HTTP body, a channel).
//! It is closed exactly once: when the fragments run out, when a fragment
//! fails, when [`CompletionStream::close`] is called, or when it is dropped.
//! Closing drops the source and runs the release hook.

use crate::types::Result;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Boxed source of answer fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

type ReleaseHook = Box<dyn FnOnce() + Send>;

pub struct CompletionStream {
    inner: Option<FragmentStream>,
    release: Option<ReleaseHook>,
}

impl CompletionStream {
    pub fn new(inner: FragmentStream) -> Self {
        Self {
            inner: Some(inner),
            release: None,
        }
    }

    /// Run `release` once the stream is closed, whichever way that happens.
    pub fn with_release<F>(inner: FragmentStream, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: Some(inner),
            release: Some(Box::new(release)),
        }
    }

    /// A stream over already-known fragments.
    pub fn from_fragments(fragments: Vec<Result<String>>) -> Self {
        Self::new(Box::pin(futures::stream::iter(fragments)))
    }

    /// Stop the stream and release its resources. Idempotent.
    pub fn close(&mut self) {
        self.inner = None;
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Drain the stream into one string.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for CompletionStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(Some(Err(e))) => {
                this.close();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}
