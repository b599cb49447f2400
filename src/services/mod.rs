pub mod drain_scheduler;
pub mod event_queue;
pub mod lastfm;
pub mod proxy;
pub mod queuing_client;

pub use drain_scheduler::{run_drain, DrainScheduler};
pub use event_queue::EventQueue;
pub use lastfm::LastfmClient;
pub use proxy::{proxy, set_proxy};
pub use queuing_client::{ErrorPolicy, QueuingClient, RemoteClient};
