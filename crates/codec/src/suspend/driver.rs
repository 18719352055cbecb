use std::{
    fmt,
    rc::Rc,
    task::{Context, Poll},
};

use alloy::primitives::Bytes;
use async_trait::async_trait;
use eyre::eyre;
use futures::{future::LocalBoxFuture, task::noop_waker_ref, FutureExt};
use tracing::{debug, warn};

use super::{Mailbox, Request};
use crate::{error::Error, state::Word, value::DecodedValue};

/// A source of storage words the snapshot does not contain, such as a node or a trace.
#[async_trait(?Send)]
pub trait StorageHost {
    /// Fetches the 32-byte reply to `request`.
    async fn fetch(&self, request: &Request) -> eyre::Result<Bytes>;
}

/// What a [`Decoding`] did when stepped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The computation paused and needs a reply to this request.
    Request(Request),
    /// The computation finished.
    Complete(DecodedValue),
}

/// A resumable decode.
///
/// Step it with [`Decoding::step`] and answer each [`Step::Request`] with
/// [`Decoding::resume`], or hand it a reply source with [`Decoding::run_with`] or
/// [`Decoding::drive`]. Dropping a paused decoding abandons it; nothing is held across a pause.
pub struct Decoding<'a> {
    computation: Option<LocalBoxFuture<'a, Result<DecodedValue, Error>>>,
    mailbox: Rc<Mailbox>,
    waiting: Option<Request>,
    suspensions: usize,
}

impl fmt::Debug for Decoding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoding")
            .field("finished", &self.computation.is_none())
            .field("waiting", &self.waiting)
            .field("suspensions", &self.suspensions)
            .finish()
    }
}

impl<'a> Decoding<'a> {
    pub(crate) fn new(
        computation: LocalBoxFuture<'a, Result<DecodedValue, Error>>,
        mailbox: Rc<Mailbox>,
    ) -> Self {
        Decoding { computation: Some(computation), mailbox, waiting: None, suspensions: 0 }
    }

    /// Runs the computation until it either completes or needs a reply. Stepping a computation
    /// that is waiting on a reply returns the same request again.
    pub fn step(&mut self) -> Result<Step, Error> {
        if let Some(request) = self.waiting {
            return Ok(Step::Request(request));
        }

        let computation = self.computation.as_mut().ok_or(Error::Completed)?;
        let mut cx = Context::from_waker(noop_waker_ref());

        match computation.poll_unpin(&mut cx) {
            Poll::Ready(result) => {
                self.computation = None;
                debug!("decoding completed after {} suspensions", self.suspensions);
                result.map(Step::Complete)
            }
            Poll::Pending => {
                let request = self.mailbox.take_pending().ok_or_else(|| {
                    self.computation = None;
                    Error::Eyre(eyre!("decoding paused without issuing a request"))
                })?;

                self.suspensions += 1;
                self.waiting = Some(request);
                Ok(Step::Request(request))
            }
        }
    }

    /// Answers the pending request with `reply`, which must be exactly one 32-byte word, and
    /// continues the computation. A malformed reply aborts the decode.
    pub fn resume(&mut self, reply: impl Into<Bytes>) -> Result<Step, Error> {
        if self.computation.is_none() {
            return Err(Error::Completed);
        }
        let request = self.waiting.take().ok_or(Error::UnexpectedReply)?;
        let reply = reply.into();

        let word = match Word::try_from(reply.to_vec()) {
            Ok(word) => word,
            Err(_) => {
                warn!("malformed reply of {} bytes to {}", reply.len(), request);
                self.computation = None;
                return Err(Error::MalformedReply { request, length: reply.len() });
            }
        };

        debug!("resuming with reply to {}", request);
        self.mailbox.deliver(&request, word);
        self.step()
    }

    /// Drives the computation to completion, answering every request with `reply`.
    pub fn run_with<F>(mut self, mut reply: F) -> Result<DecodedValue, Error>
    where
        F: FnMut(&Request) -> Result<Bytes, Error>,
    {
        let mut step = self.step()?;
        loop {
            match step {
                Step::Complete(value) => return Ok(value),
                Step::Request(request) => {
                    let answer = reply(&request)?;
                    step = self.resume(answer)?;
                }
            }
        }
    }

    /// Drives the computation to completion, fetching every requested word from `host`.
    pub async fn drive<H>(mut self, host: &H) -> Result<DecodedValue, Error>
    where
        H: StorageHost + ?Sized,
    {
        let mut step = self.step()?;
        loop {
            match step {
                Step::Complete(value) => return Ok(value),
                Step::Request(request) => {
                    let answer = host.fetch(&request).await?;
                    step = self.resume(answer)?;
                }
            }
        }
    }

    /// Drives the computation to completion without a host. Fails with
    /// [`Error::Unavailable`] if a storage word missing from the snapshot is needed.
    pub fn run_to_completion(self) -> Result<DecodedValue, Error> {
        self.run_with(|request| Err(Error::Unavailable { request: *request }))
    }

    /// How many times the computation has paused so far.
    pub fn suspensions(&self) -> usize {
        self.suspensions
    }

    /// The request the computation is waiting on, if any.
    pub fn pending(&self) -> Option<&Request> {
        self.waiting.as_ref()
    }

    /// Whether the computation has finished, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.computation.is_none()
    }
}
