//! The order lifecycle: transition planning, compensations and the public flow API.
//!
//! The split mirrors the way the engine thinks about a mutation:
//! * [`transition`] is the pure part. Given the current order row and a requested change, it either rejects the
//!   request (illegal transition) or produces a [`transition::TransitionPlan`]: the fields to persist, the
//!   compensations to run first, and the notifications to send afterwards. No I/O happens here, which is what makes
//!   the guard logic trivially testable.
//! * [`order_flow_api`] is the effectful part. It re-fetches the order, asks the planner for a plan, executes the
//!   compensations in their fixed order, persists through the guarded update, and finally hands the notification
//!   intents to the dispatcher, which logs and swallows delivery failures.
pub mod errors;
pub mod notifications;
pub mod order_flow_api;
pub mod status_map;
pub mod transition;
