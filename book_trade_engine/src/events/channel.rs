//! Simple stateless pub-sub event handling.
//!
//! Hosts can subscribe to order lifecycle events (order annulled, pickup missed, order delivered) and react to them
//! without touching the transition logic. Handlers are stateless: all they receive is the event itself, though they
//! can be async and capture whatever collaborators they need.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Receive events until the last producer is dropped, dispatching each to its own task so a slow handler never
    /// blocks the channel, then wait for the in-flight handlers to drain.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // drop the internal sender so the loop ends once the last subscriber is gone
        drop(self.sender);
        let mut in_flight = JoinSet::new();
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            in_flight.spawn(async move { (handler)(ev).await });
            // reap whatever has already finished so the set stays small on a long-lived channel
            while in_flight.try_join_next().is_some() {}
        }
        debug!("📬️ Waiting for {} in-flight handlers to complete", in_flight.len());
        while let Some(completed) = in_flight.join_next().await {
            if let Err(e) = completed {
                warn!("📬️ An event handler panicked: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        db_types::{DeliveryStatus, OrderStatusType},
        events::OrderDeliveredEvent,
        test_utils::make_order,
    };

    #[tokio::test]
    async fn deliveries_from_every_producer_reach_the_handler() {
        let _ = env_logger::try_init();
        let seen = Arc::new(AtomicUsize::new(0));
        let tally = seen.clone();
        let handler: Handler<OrderDeliveredEvent> = Arc::new(move |ev| {
            let tally = tally.clone();
            Box::pin(async move {
                debug!("Handler received delivery of {}", ev.order.order_id);
                assert_eq!(ev.delivery_status, DeliveryStatus::Delivered);
                tally.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        // a deliberately tiny buffer so publishers get backpressure
        let event_handler = EventHandler::new(1, handler);
        let from_reconciler = event_handler.subscribe();
        let from_api = event_handler.subscribe();
        tokio::spawn(async move {
            for n in 0..4 {
                let order =
                    make_order(&format!("D{n}"), OrderStatusType::Delivered, Some(DeliveryStatus::Delivered));
                from_reconciler.publish_event(OrderDeliveredEvent::new(order)).await;
            }
        });
        tokio::spawn(async move {
            let order = make_order("D9", OrderStatusType::Delivered, Some(DeliveryStatus::Delivered));
            from_api.publish_event(OrderDeliveredEvent::new(order)).await;
        });

        // returns only after both producers are dropped and the in-flight handlers have drained
        event_handler.start_handler().await;
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
