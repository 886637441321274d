mod settings;

pub use settings::{
    DatabaseConfig, DispatchConfig, OtelConfig, RedisConfig, SchedulerConfig, ServerConfig,
    Settings, StorageConfig,
};
