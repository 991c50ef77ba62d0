pub mod broadcast;
pub mod engine;
pub mod subscriptions;
pub mod topic;

pub use broadcast::Delivery;
pub use engine::{Broker, SharedBroker};
pub use subscriptions::{Subscription, SubscriptionTable};
pub use topic::{Topic, TopicRegistry};
