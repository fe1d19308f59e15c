//! Domain events and their distribution.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{DEFAULT_JOURNAL_CAPACITY, InMemoryBusError, InMemoryEventBus};
