//! Identity notifications
//!
//! Listeners hear about first-time identifications only: a success from an
//! authenticator that is neither stateless nor persistent (Form, Cookie).
//! Token, JWT, Basic, Digest and Session successes never notify.

use super::AuthenticationService;
use crate::auth::AuthenticatorRef;
use crate::identity::Identity;
use std::fmt;
use tokio::sync::mpsc;

/// Payload of an identity notification
#[derive(Clone, Copy)]
pub struct IdentifiedEvent<'a> {
    pub authenticator: &'a AuthenticatorRef,
    pub identity: &'a Identity,
    pub service: &'a AuthenticationService,
}

impl fmt::Debug for IdentifiedEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifiedEvent")
            .field("authenticator", &self.authenticator)
            .field("identity", &self.identity.id())
            .finish_non_exhaustive()
    }
}

/// Observer for identity notifications
pub trait IdentityListener: Send + Sync {
    fn identified(&self, event: &IdentifiedEvent<'_>);
}

impl<F> IdentityListener for F
where
    F: Fn(&IdentifiedEvent<'_>) + Send + Sync,
{
    fn identified(&self, event: &IdentifiedEvent<'_>) {
        self(event)
    }
}

/// Owned copy of an [`IdentifiedEvent`], for channels
#[derive(Debug, Clone)]
pub struct Identified {
    pub authenticator: AuthenticatorRef,
    pub identity: Identity,
}

/// Forwards notifications into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<Identified>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Identified>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl IdentityListener for ChannelListener {
    fn identified(&self, event: &IdentifiedEvent<'_>) {
        let message = Identified {
            authenticator: event.authenticator.clone(),
            identity: event.identity.clone(),
        };
        if self.sender.send(message).is_err() {
            tracing::debug!("Identity notification receiver dropped");
        }
    }
}
