mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::{EventType, OrderAnnulledEvent, OrderDeliveredEvent, PickupMissedEvent, PickupRescheduledEvent};
pub use hooks::{EventHandlers, EventHooks, EventProducers};
