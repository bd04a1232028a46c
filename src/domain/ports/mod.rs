pub mod breaker_store;
pub mod channel_publisher;
pub mod clock;
pub mod credential_provider;
pub mod dlq_store;
pub mod event_bus;
pub mod job_store;

pub use breaker_store::BreakerStore;
pub use channel_publisher::{ChannelPublisher, PublishError, PublishSuccess};
pub use clock::Clock;
pub use credential_provider::{ChannelCredentials, CredentialProvider};
pub use dlq_store::DlqStore;
pub use event_bus::EventBus;
pub use job_store::JobStore;
