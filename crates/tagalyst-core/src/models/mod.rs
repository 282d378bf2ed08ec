pub mod message_value;
pub mod tag_histogram;
pub mod thread_metadata;

pub use message_value::MessageValue;
pub use tag_histogram::{TagCount, TagHistogram};
pub use thread_metadata::{ThreadMetadata, ThreadStats};
