//! The suspension protocol.
//!
//! Decoding is written as ordinary `async` code. When a storage word is missing from the
//! snapshot, the reader awaits a [`Suspend`] future, which files a [`Request`] with the session's
//! [`Mailbox`] and yields. The [`Decoding`] driver sees the pending request, obtains a reply from
//! the host, delivers it to the mailbox, and polls again; the reader then picks the reply up and
//! carries on from where it paused.

mod driver;

use std::{
    cell::RefCell,
    fmt::{self, Display},
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use alloy::primitives::U256;
use hashbrown::HashMap;
use tracing::debug;

use crate::state::Word;

pub use driver::{Decoding, Step, StorageHost};

/// A description of bytes the decoder needs but does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// The 32-byte word at a storage slot.
    Storage {
        /// The resolved slot address
        slot: U256,
    },
}

impl Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Storage { slot } => write!(f, "storage slot 0x{slot:x}"),
        }
    }
}

/// Per-session exchange between the decoder and its driver: at most one outstanding request,
/// and every reply received so far.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    pending: RefCell<Option<Request>>,
    replies: RefCell<HashMap<U256, Word>>,
}

impl Mailbox {
    /// A reply already received for `slot`, if any.
    pub(crate) fn answered(&self, slot: &U256) -> Option<Word> {
        self.replies.borrow().get(slot).copied()
    }

    /// A future that suspends the decode until `request` has been answered.
    pub(crate) fn request(&self, request: Request) -> Suspend<'_> {
        Suspend { mailbox: self, request, filed: false }
    }

    /// Takes the outstanding request, if the computation is waiting on one.
    pub(crate) fn take_pending(&self) -> Option<Request> {
        self.pending.borrow_mut().take()
    }

    /// Records the reply to `request`.
    pub(crate) fn deliver(&self, request: &Request, word: Word) {
        match request {
            Request::Storage { slot } => {
                self.replies.borrow_mut().insert(*slot, word);
            }
        }
    }
}

/// Resolves to the reply to a request, yielding to the driver until one is delivered.
#[derive(Debug)]
pub(crate) struct Suspend<'a> {
    mailbox: &'a Mailbox,
    request: Request,
    filed: bool,
}

impl Future for Suspend<'_> {
    type Output = Word;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Request::Storage { slot } = self.request;
        if let Some(word) = self.mailbox.answered(&slot) {
            return Poll::Ready(word);
        }

        if !self.filed {
            debug!("suspending on {}", self.request);
            self.filed = true;
        }
        *self.mailbox.pending.borrow_mut() = Some(self.request);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use futures::{task::noop_waker_ref, FutureExt};

    use super::*;

    #[test]
    fn test_suspend_waits_for_delivery() {
        let mailbox = Mailbox::default();
        let request = Request::Storage { slot: U256::from(3) };
        let mut future = Box::pin(mailbox.request(request));
        let mut cx = Context::from_waker(noop_waker_ref());

        assert_eq!(future.poll_unpin(&mut cx), Poll::Pending);
        assert_eq!(mailbox.take_pending(), Some(request));
        assert_eq!(mailbox.take_pending(), None);

        mailbox.deliver(&request, [7u8; 32]);
        assert_eq!(future.poll_unpin(&mut cx), Poll::Ready([7u8; 32]));
        assert_eq!(mailbox.answered(&U256::from(3)), Some([7u8; 32]));
    }

    #[test]
    fn test_request_display() {
        assert_eq!(Request::Storage { slot: U256::from(255) }.to_string(), "storage slot 0xff");
    }
}
