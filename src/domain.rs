pub mod callback;
pub mod error;
pub mod id;
pub mod payment;
pub mod ports;
pub mod subscription;
