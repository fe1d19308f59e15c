//! Service wiring for the HTTP layer.

use std::sync::Arc;

use pettycash_events::{EventEnvelope, InMemoryEventBus};
use pettycash_infra::{InMemoryDepositStore, PettyCashConfig, PettyCashService};
use pettycash_ledger::DepositEvent;

pub type LedgerBus = Arc<InMemoryEventBus<EventEnvelope<DepositEvent>>>;

pub type AppServices = PettyCashService<Arc<InMemoryDepositStore>, LedgerBus>;

/// Build the in-memory service stack and start the audit log subscriber.
pub fn build_services(config: &PettyCashConfig) -> AppServices {
    let store = Arc::new(InMemoryDepositStore::new());
    let bus: LedgerBus = Arc::new(InMemoryEventBus::new());

    spawn_audit_log(&bus);

    PettyCashService::new(store, bus, config)
}

/// Log every committed ledger event, starting from whatever the bus has
/// journaled. The thread ends when the bus is dropped.
fn spawn_audit_log(bus: &LedgerBus) {
    let sub = bus.subscribe_with_replay();
    std::thread::spawn(move || {
        while let Ok(envelope) = sub.recv() {
            let withdrawal = envelope.payload().withdrawal_id().map(|id| id.to_string());
            tracing::info!(
                organization = %envelope.organization_id(),
                deposit = %envelope.aggregate_id(),
                withdrawal = withdrawal.as_deref(),
                version = envelope.version(),
                event_type = envelope.event_type(),
                "ledger event committed"
            );
        }
    });
}
