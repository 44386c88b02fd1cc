//! Listener events and the dispatch queue.
//!
//! Every state change the node makes is announced as a typed event.
//! Announcing never runs listener code on the announcing thread:
//! events are posted to an unbounded queue drained by a single
//! dispatcher task, so listeners observe one total order of events and
//! the node lock is never held during delivery.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::registry::Registry;
use crate::types::{BlockId, ListenerId, TransactionId, WalletId};

/// Wallet event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletEventKind {
    Created,
    BalanceUpdated,
    DefaultGasLimitUpdated,
    DefaultGasPriceUpdated,
}

/// Transaction event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEventKind {
    Created,
    Signed,
    Submitted,
    Included,
    Errored,
    GasEstimateUpdated,
    Added,
    Removed,
}

/// Block event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockEventKind {
    Created,
}

/// Outcome attached to every event: success, or the precondition that
/// failed. Operations report failures through the same event they
/// would have emitted on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Success,
    UnknownWallet,
    UnknownTransaction,
    NodeNotConnected,
    SigningFailed,
    SubmissionFailed,
}

impl EventStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, EventStatus::Success)
    }
}

/// A typed event as queued for dispatch.
#[derive(Debug, Clone)]
pub enum Event {
    Wallet {
        wallet: WalletId,
        kind: WalletEventKind,
        status: EventStatus,
        description: Option<String>,
    },
    Transaction {
        wallet: WalletId,
        transaction: TransactionId,
        kind: TransactionEventKind,
        status: EventStatus,
        description: Option<String>,
    },
    Block {
        block: BlockId,
        kind: BlockEventKind,
        status: EventStatus,
        description: Option<String>,
    },
}

/// A subscriber to node events. All methods default to no-ops, so an
/// implementor overrides only the categories it cares about.
pub trait Listener: Send + Sync {
    fn wallet_event(
        &self,
        _wallet: WalletId,
        _kind: WalletEventKind,
        _status: EventStatus,
        _description: Option<&str>,
    ) {
    }

    fn transaction_event(
        &self,
        _wallet: WalletId,
        _transaction: TransactionId,
        _kind: TransactionEventKind,
        _status: EventStatus,
        _description: Option<&str>,
    ) {
    }

    fn block_event(
        &self,
        _block: BlockId,
        _kind: BlockEventKind,
        _status: EventStatus,
        _description: Option<&str>,
    ) {
    }
}

/// The queue-plus-dispatcher pair behind all announce calls.
pub struct EventBus {
    listeners: Arc<Mutex<Registry<Arc<dyn Listener>>>>,
    sender: Mutex<Option<UnboundedSender<Event>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Create the bus and spawn its dispatcher task. Must be called
    /// from within a Tokio runtime.
    pub fn start() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let listeners: Arc<Mutex<Registry<Arc<dyn Listener>>>> =
            Arc::new(Mutex::new(Registry::new()));
        let dispatcher = tokio::spawn(dispatch_loop(receiver, Arc::clone(&listeners)));
        EventBus {
            listeners,
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Register a listener; returns its stable slot id.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let mut listeners = self.listeners.lock().expect("listener table poisoned");
        ListenerId(listeners.insert(listener))
    }

    /// Clear a listener slot. The id is never handed out again.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().expect("listener table poisoned");
        listeners.clear_slot(id.0)
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        let listeners = self.listeners.lock().expect("listener table poisoned");
        listeners.get(id.0).is_some()
    }

    /// Queue an event for delivery. Best-effort: a bus that has been
    /// shut down drops the event silently.
    pub fn announce(&self, event: Event) {
        let sender = self.sender.lock().expect("event sender poisoned");
        if let Some(sender) = sender.as_ref() {
            if sender.send(event).is_err() {
                tracing::warn!("event dispatcher gone; dropping event");
            }
        }
    }

    /// Close the queue and wait for the dispatcher to drain it.
    pub async fn shutdown(&self) {
        self.sender.lock().expect("event sender poisoned").take();
        let dispatcher = self
            .dispatcher
            .lock()
            .expect("dispatcher handle poisoned")
            .take();
        if let Some(handle) = dispatcher {
            let _ = handle.await;
        }
    }
}

async fn dispatch_loop(
    mut receiver: UnboundedReceiver<Event>,
    listeners: Arc<Mutex<Registry<Arc<dyn Listener>>>>,
) {
    while let Some(event) = receiver.recv().await {
        // Snapshot outside of delivery so listeners may add or remove
        // listeners without deadlocking.
        let targets: Vec<Arc<dyn Listener>> = {
            let listeners = listeners.lock().expect("listener table poisoned");
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in targets {
            deliver(listener.as_ref(), &event);
        }
    }
}

fn deliver(listener: &dyn Listener, event: &Event) {
    match event {
        Event::Wallet {
            wallet,
            kind,
            status,
            description,
        } => listener.wallet_event(*wallet, *kind, *status, description.as_deref()),
        Event::Transaction {
            wallet,
            transaction,
            kind,
            status,
            description,
        } => listener.transaction_event(
            *wallet,
            *transaction,
            *kind,
            *status,
            description.as_deref(),
        ),
        Event::Block {
            block,
            kind,
            status,
            description,
        } => listener.block_event(*block, *kind, *status, description.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        wallet_events: StdMutex<Vec<(WalletId, WalletEventKind)>>,
    }

    impl Listener for Recorder {
        fn wallet_event(
            &self,
            wallet: WalletId,
            kind: WalletEventKind,
            _status: EventStatus,
            _description: Option<&str>,
        ) {
            self.wallet_events.lock().unwrap().push((wallet, kind));
        }
    }

    #[tokio::test]
    async fn events_arrive_in_announce_order() {
        let bus = EventBus::start();
        let recorder = Arc::new(Recorder::default());
        bus.add_listener(recorder.clone());

        for i in 0..5 {
            bus.announce(Event::Wallet {
                wallet: WalletId(i),
                kind: WalletEventKind::BalanceUpdated,
                status: EventStatus::Success,
                description: None,
            });
        }
        bus.shutdown().await;

        let seen = recorder.wallet_events.lock().unwrap();
        let order: Vec<usize> = seen.iter().map(|(w, _)| w.0).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn removed_listener_slot_is_skipped() {
        let bus = EventBus::start();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let first_id = bus.add_listener(first.clone());
        let second_id = bus.add_listener(second.clone());
        assert_ne!(first_id, second_id);

        assert!(bus.remove_listener(first_id));
        assert!(!bus.has_listener(first_id));
        assert!(bus.has_listener(second_id));

        bus.announce(Event::Wallet {
            wallet: WalletId(0),
            kind: WalletEventKind::Created,
            status: EventStatus::Success,
            description: None,
        });
        bus.shutdown().await;

        assert!(first.wallet_events.lock().unwrap().is_empty());
        assert_eq!(second.wallet_events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn announce_after_shutdown_is_dropped() {
        let bus = EventBus::start();
        bus.shutdown().await;
        bus.announce(Event::Block {
            block: BlockId(0),
            kind: BlockEventKind::Created,
            status: EventStatus::Success,
            description: None,
        });
        // Nothing to assert beyond "does not panic or hang".
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
