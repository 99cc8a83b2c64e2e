//! StackPay HTTP service
//!
//! Outer adapter over the `stackpay` flows: read endpoints, the
//! `/pay/:paymentId` deep link, QR rendering and "prepare" endpoints that
//! return unsigned contract calls for the user's wallet to sign.

pub mod api;
pub mod config;
pub mod error;
pub mod manager;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use manager::PaymentService;
