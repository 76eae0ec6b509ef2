//! Latest-wins rate limiting for view streams

use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `period`.
    ///
    /// The first item passes straight through. Items that arrive while the
    /// window is closed replace each other; when the window reopens the most
    /// recent one is emitted. A pending item is still delivered after the inner
    /// stream ends.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream returned by [`ThrottleExt::throttle`].
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        window: Pin<Box<Sleep>>,
        period: Duration,
        latest: Option<S::Item>,
        window_open: bool,
        exhausted: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        Self {
            stream,
            window: Box::pin(sleep(Duration::ZERO)),
            period,
            latest: None,
            window_open: true,
            exhausted: false,
        }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.exhausted {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.latest = Some(item),
                Poll::Ready(None) => *this.exhausted = true,
                Poll::Pending => break,
            }
        }

        if !*this.window_open {
            if this.window.as_mut().poll(cx).is_pending() {
                if *this.exhausted && this.latest.is_none() {
                    return Poll::Ready(None);
                }
                return Poll::Pending;
            }
            *this.window_open = true;
        }

        match this.latest.take() {
            Some(item) => {
                let deadline = Instant::now() + *this.period;
                this.window.as_mut().reset(deadline);
                *this.window_open = false;
                Poll::Ready(Some(item))
            }
            None if *this.exhausted => Poll::Ready(None),
            None => Poll::Pending,
        }
    }
}
