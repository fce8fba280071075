//! Live subscriptions over the event bus.

pub mod gateway;

pub use gateway::{DeliveryFilter, SubscriptionGateway};
