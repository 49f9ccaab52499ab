//! EventHorizon: publish/subscribe with bounded history and field metrics.

use crate::handler::{Delivery, Handler, HandlerResult, SubscriptionId, Topic};
use crate::history::{HistoryFilter, ResonanceField};
use crate::resonance::ResonanceWeights;
use crate::supervisor::{panic_message, TaskSupervisor};
use chrono::Utc;
use resonance_core::{BusConfig, Error, KernelConfig, ResonanceConfig, Result, SemanticEvent};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, warn};

struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

/// Counters for observers and tests.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BusStats {
    pub published: u64,
    pub history_len: usize,
    pub subscriber_count: usize,
    pub handler_failures: u64,
    pub deferred_spawned: u64,
    pub deferred_failed: u64,
}

pub struct EventHorizon {
    config: BusConfig,
    weights: ResonanceWeights,
    history: RwLock<VecDeque<SemanticEvent>>,
    subscribers: RwLock<HashMap<Topic, Vec<Subscriber>>>,
    supervisor: TaskSupervisor,
    published: AtomicU64,
    handler_failures: AtomicU64,
}

impl Default for EventHorizon {
    fn default() -> Self {
        Self::new(&BusConfig::default(), &ResonanceConfig::default())
    }
}

impl EventHorizon {
    pub fn new(config: &BusConfig, resonance: &ResonanceConfig) -> Self {
        Self {
            config: config.clone(),
            weights: ResonanceWeights::new(resonance),
            history: RwLock::new(VecDeque::new()),
            subscribers: RwLock::new(HashMap::new()),
            supervisor: TaskSupervisor::new(),
            published: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(&config.bus, &config.resonance)
    }

    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.supervisor
    }

    pub fn weights(&self) -> &ResonanceWeights {
        &self.weights
    }

    /// Score, record, and dispatch `event`. Returns the event as stored.
    ///
    /// Exact-type subscribers run first, then wildcard subscribers, all in
    /// subscription order on the caller's stack. Handler errors and panics
    /// are logged and swallowed. Deferred work is spawned, not awaited.
    pub fn publish(&self, mut event: SemanticEvent) -> SemanticEvent {
        event.resonance_signature = self.weights.score(&event);

        {
            let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
            history.push_back(event.clone());
            while history.len() > self.config.history_capacity {
                history.pop_front();
            }
        }
        self.published.fetch_add(1, Ordering::Relaxed);

        // Snapshot so handlers can publish or (un)subscribe re-entrantly.
        let targets: Vec<(SubscriptionId, Handler)> = {
            let subs = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            let exact = subs.get(&Topic::Exact(event.event_type.clone()));
            let wildcard = subs.get(&Topic::Any);
            exact
                .into_iter()
                .chain(wildcard)
                .flatten()
                .map(|s| (s.id.clone(), s.handler.clone()))
                .collect()
        };

        debug!(
            "Publishing {} from {} (resonance {:.1}) to {} handlers",
            event.event_type,
            event.source_module,
            event.resonance_signature,
            targets.len()
        );

        for (id, handler) in targets {
            match catch_unwind(AssertUnwindSafe(|| (*handler)(&event))) {
                Ok(Ok(Delivery::Done)) => {}
                Ok(Ok(Delivery::Deferred(work))) => {
                    self.supervisor.spawn(id.to_string(), work);
                }
                Ok(Err(e)) => {
                    self.handler_failures.fetch_add(1, Ordering::Relaxed);
                    warn!("Handler {} failed on {}: {:#}", id, event.event_type, e);
                }
                Err(panic) => {
                    self.handler_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "Handler {} panicked on {}: {}",
                        id,
                        event.event_type,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        event
    }

    /// Register `handler` for `topic` (`"*"` for every event type).
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, handler: F) -> SubscriptionId
    where
        F: Fn(&SemanticEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = SubscriptionId::new(topic.clone());
        let mut subs = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        subs.entry(topic).or_default().push(Subscriber {
            id: id.clone(),
            handler: Arc::new(handler),
        });
        debug!("Subscribed {}", id);
        id
    }

    /// Register a handler whose whole body is deferred work.
    pub fn subscribe_async<F, Fut>(&self, topic: impl Into<Topic>, handler: F) -> SubscriptionId
    where
        F: Fn(SemanticEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(topic, move |event: &SemanticEvent| {
            Ok(Delivery::deferred(handler(event.clone())))
        })
    }

    /// Remove a subscription; an emptied topic bucket is dropped.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        let mut subs = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let bucket = subs
            .get_mut(id.topic())
            .ok_or_else(|| Error::SubscriptionNotFound(id.to_string()))?;
        let before = bucket.len();
        bucket.retain(|s| &s.id != id);
        if bucket.len() == before {
            return Err(Error::SubscriptionNotFound(id.to_string()));
        }
        if bucket.is_empty() {
            subs.remove(id.topic());
        }
        debug!("Unsubscribed {}", id);
        Ok(())
    }

    pub fn query_history(&self, filter: &HistoryFilter) -> Vec<SemanticEvent> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        filter.apply(history.iter())
    }

    /// Metrics over events stamped within the trailing window.
    pub fn resonance_field(&self) -> ResonanceField {
        // a window reaching past the representable range covers everything
        let cutoff = Utc::now().checked_sub_signed(self.config.field_window());
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        ResonanceField::compute(
            history.iter().filter(|e| cutoff.map_or(true, |c| e.timestamp >= c)),
            self.config.field_window_secs,
        )
    }

    pub fn history_len(&self) -> usize {
        self.history.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            history_len: self.history_len(),
            subscriber_count: self.subscriber_count(),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            deferred_spawned: self.supervisor.spawned(),
            deferred_failed: self.supervisor.failed(),
        }
    }
}
