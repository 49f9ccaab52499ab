//! Subscription handles and handler signatures.

use futures::future::BoxFuture;
use resonance_core::SemanticEvent;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Async tail of a handler. Spawned by the supervisor, never awaited by `publish`.
pub type DeferredWork = BoxFuture<'static, anyhow::Result<()>>;

/// What a handler hands back after its synchronous part ran.
pub enum Delivery {
    Done,
    Deferred(DeferredWork),
}

impl Delivery {
    pub fn deferred<F>(work: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::Deferred(Box::pin(work))
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

pub type HandlerResult = anyhow::Result<Delivery>;

pub type Handler = Arc<dyn Fn(&SemanticEvent) -> HandlerResult + Send + Sync>;

/// Which events a subscription receives.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Topic {
    /// Every event type.
    Any,
    Exact(String),
}

impl Topic {
    pub const WILDCARD: &'static str = "*";
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        if s == Self::WILDCARD {
            Self::Any
        } else {
            Self::Exact(s.to_string())
        }
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        if s == Self::WILDCARD {
            Self::Any
        } else {
            Self::Exact(s)
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str(Self::WILDCARD),
            Self::Exact(t) => f.write_str(t),
        }
    }
}

/// Opaque subscription handle: the topic plus a uniqueness token.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SubscriptionId {
    topic: Topic,
    token: Uuid,
}

impl SubscriptionId {
    pub(crate) fn new(topic: Topic) -> Self {
        Self { topic, token: Uuid::new_v4() }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.topic, self.token)
    }
}
