use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderAnnulledEvent,
    OrderDeliveredEvent,
    PickupMissedEvent,
    PickupRescheduledEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub pickup_missed_producer: Vec<EventProducer<PickupMissedEvent>>,
    pub pickup_rescheduled_producer: Vec<EventProducer<PickupRescheduledEvent>>,
    pub order_delivered_producer: Vec<EventProducer<OrderDeliveredEvent>>,
}

pub struct EventHandlers {
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_pickup_missed: Option<EventHandler<PickupMissedEvent>>,
    pub on_pickup_rescheduled: Option<EventHandler<PickupRescheduledEvent>>,
    pub on_order_delivered: Option<EventHandler<OrderDeliveredEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_annulled = hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f));
        let on_pickup_missed = hooks.on_pickup_missed.map(|f| EventHandler::new(buffer_size, f));
        let on_pickup_rescheduled = hooks.on_pickup_rescheduled.map(|f| EventHandler::new(buffer_size, f));
        let on_order_delivered = hooks.on_order_delivered.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_annulled, on_pickup_missed, on_pickup_rescheduled, on_order_delivered }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_pickup_missed {
            result.pickup_missed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_pickup_rescheduled {
            result.pickup_rescheduled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_delivered {
            result.order_delivered_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_pickup_missed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_pickup_rescheduled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_delivered {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_pickup_missed: Option<Handler<PickupMissedEvent>>,
    pub on_pickup_rescheduled: Option<Handler<PickupRescheduledEvent>>,
    pub on_order_delivered: Option<Handler<OrderDeliveredEvent>>,
}

impl EventHooks {
    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_pickup_missed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PickupMissedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_pickup_missed = Some(Arc::new(f));
        self
    }

    pub fn on_pickup_rescheduled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PickupRescheduledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_pickup_rescheduled = Some(Arc::new(f));
        self
    }

    pub fn on_order_delivered<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderDeliveredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_delivered = Some(Arc::new(f));
        self
    }
}
