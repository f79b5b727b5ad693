pub mod pipeline;
pub mod supervisor;

pub use pipeline::{RsiFeed, VwapFeed};
pub use supervisor::FeedSupervisor;
