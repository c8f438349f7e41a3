//! Request handler definitions.
//!
//! Authentication is handled upstream by the marketplace gateway; what reaches this service is an opaque caller
//! identity in the `btx-user-id` header. Each handler checks that the caller is the right party to the order (buyer
//! for cancellation, seller for decline and the missed-pickup flow) before handing over to the lifecycle engine,
//! which enforces the state machine itself.
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use book_trade_engine::{
    db_types::{Order, OrderId},
    traits::OrderStore,
    OrderFlowError,
};
use log::*;

use crate::{
    data_objects::{CancelRequest, DeclineRequest, MissedPickupRequest, RescheduleRequest},
    errors::ServerError,
    BackendFlowApi,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Orders  ----------------------------------------------------

#[post("/order/{id}/cancel")]
pub async fn cancel_order(
    req: HttpRequest,
    path: web::Path<OrderId>,
    body: web::Json<CancelRequest>,
    api: web::Data<BackendFlowApi>,
) -> Result<HttpResponse, ServerError> {
    let oid = path.into_inner();
    let caller = caller_id(&req)?;
    debug!("💻️ POST cancel for order {oid} by {caller}");
    let order = fetch_order(&api, &oid).await?;
    if order.buyer_id != caller {
        return Err(ServerError::NotAParty);
    }
    let updated = api.cancel_order_by_buyer(&oid, &body.reason).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[post("/order/{id}/decline")]
pub async fn decline_order(
    req: HttpRequest,
    path: web::Path<OrderId>,
    body: web::Json<DeclineRequest>,
    api: web::Data<BackendFlowApi>,
) -> Result<HttpResponse, ServerError> {
    let oid = path.into_inner();
    let caller = caller_id(&req)?;
    debug!("💻️ POST decline for order {oid} by {caller}");
    ensure_seller(&api, &oid, &caller).await?;
    let updated = api.decline_order(&oid, &body.reason).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[post("/order/{id}/missed-pickup")]
pub async fn missed_pickup(
    req: HttpRequest,
    path: web::Path<OrderId>,
    body: web::Json<MissedPickupRequest>,
    api: web::Data<BackendFlowApi>,
) -> Result<HttpResponse, ServerError> {
    let oid = path.into_inner();
    let caller = caller_id(&req)?;
    debug!("💻️ POST missed-pickup for order {oid} by {caller}");
    ensure_seller(&api, &oid, &caller).await?;
    let updated = api.handle_missed_pickup(&oid, &body.feedback).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[get("/order/{id}/reschedule-quote")]
pub async fn reschedule_quote(
    req: HttpRequest,
    path: web::Path<OrderId>,
    api: web::Data<BackendFlowApi>,
) -> Result<HttpResponse, ServerError> {
    let oid = path.into_inner();
    let caller = caller_id(&req)?;
    debug!("💻️ GET reschedule quote for order {oid} by {caller}");
    ensure_seller(&api, &oid, &caller).await?;
    let quote = api.reschedule_quote(&oid).await?;
    Ok(HttpResponse::Ok().json(quote))
}

#[post("/order/{id}/reschedule")]
pub async fn reschedule_pickup(
    req: HttpRequest,
    path: web::Path<OrderId>,
    body: web::Json<RescheduleRequest>,
    api: web::Data<BackendFlowApi>,
) -> Result<HttpResponse, ServerError> {
    let oid = path.into_inner();
    let caller = caller_id(&req)?;
    debug!("💻️ POST reschedule for order {oid} by {caller}");
    ensure_seller(&api, &oid, &caller).await?;
    let updated = api.reschedule_pickup(&oid, body.pickup_time, &body.fee_payment_reference).await?;
    Ok(HttpResponse::Ok().json(updated))
}

// ----------------------------------------------   Helpers  ----------------------------------------------------

fn caller_id(req: &HttpRequest) -> Result<String, ServerError> {
    req.headers()
        .get("btx-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(ServerError::MissingCallerIdentity)
}

async fn fetch_order(api: &BackendFlowApi, oid: &OrderId) -> Result<Order, ServerError> {
    api.store()
        .fetch_order_by_order_id(oid)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| OrderFlowError::OrderNotFound(oid.clone()).into())
}

async fn ensure_seller(api: &BackendFlowApi, oid: &OrderId, caller: &str) -> Result<(), ServerError> {
    let order = fetch_order(api, oid).await?;
    if order.seller_id != caller {
        return Err(ServerError::NotAParty);
    }
    Ok(())
}
