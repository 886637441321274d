mod redis;

pub use redis::{
    LifecycleError, LifecycleEvent, LifecycleHandler, LifecycleMessage, LifecycleOutcome,
    LifecycleSubscriber,
};
