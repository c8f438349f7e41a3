use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use book_trade_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    OrderFlowApi,
    SqliteOrderStore,
    TrackingReconciler,
};
use courier_tools::CourierClient;
use log::*;
use paystack_tools::PaystackApi;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{CourierIntegration, PaystackGateway, PaystackPayout, PlatformClient, PlatformNotifier},
    routes::{cancel_order, decline_order, health, missed_pickup, reschedule_pickup, reschedule_quote},
    workers::{start_auto_cancel_worker, start_tracking_worker},
    BackendFlowApi,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let store = SqliteOrderStore::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    store.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let courier = CourierIntegration::new(
        CourierClient::new(config.courier.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?,
    );
    let paystack =
        PaystackApi::new(config.paystack.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = PaystackGateway::new(paystack.clone());
    let platform =
        PlatformClient::new(config.platform.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let notifier = PlatformNotifier::new(platform.clone());

    let producers = start_audit_hooks();
    if config.run_background_workers {
        let payout = PaystackPayout::new(paystack, platform);
        let reconciler =
            TrackingReconciler::new(store.clone(), courier.clone(), notifier.clone(), payout, producers.clone());
        start_tracking_worker(reconciler, config.tracking_interval);
        let sweeper =
            OrderFlowApi::new(store.clone(), gateway.clone(), courier.clone(), notifier.clone(), producers.clone());
        start_auto_cancel_worker(sweeper, config.auto_cancel_window, config.tracking_interval);
    } else {
        info!("🕰️ Background workers are disabled on this instance (BTX_RUN_WORKERS)");
    }

    let flow = OrderFlowApi::new(store, gateway, courier, notifier, producers);
    let srv = create_server_instance(&config, flow)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Register the audit-log hooks and start their handlers. Every lifecycle event gets one structured log line,
/// whichever path (HTTP, worker, reconciler) produced it.
fn start_audit_hooks() -> EventProducers {
    let mut hooks = EventHooks::default();
    hooks.on_order_annulled(|ev| {
        Box::pin(async move {
            info!("🧾️ Order {} finalised as {} for {}", ev.order.order_id, ev.status, ev.order.buyer_id);
        })
    });
    hooks.on_pickup_missed(|ev| {
        Box::pin(async move {
            info!("🧾️ Order {} missed its courier pickup: {}", ev.order.order_id, ev.feedback);
        })
    });
    hooks.on_pickup_rescheduled(|ev| {
        Box::pin(async move {
            info!("🧾️ Order {} pickup rebooked for {}", ev.order.order_id, ev.new_pickup_time);
        })
    });
    hooks.on_order_delivered(|ev| {
        Box::pin(async move {
            info!("🧾️ Order {} delivered to {}", ev.order.order_id, ev.order.buyer_id);
        })
    });
    let handlers = EventHandlers::new(32, hooks);
    let producers = handlers.producers();
    tokio::spawn(handlers.start_handlers());
    producers
}

pub fn create_server_instance(config: &ServerConfig, api: BackendFlowApi) -> Result<Server, ServerError> {
    let api = web::Data::new(api);
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("btx::access_log"))
            .app_data(api.clone())
            .service(health)
            .service(cancel_order)
            .service(decline_order)
            .service(missed_pickup)
            .service(reschedule_quote)
            .service(reschedule_pickup)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
