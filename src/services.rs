pub mod activation;
pub mod notifier;
pub mod poller;
pub mod reconciler;
