// The watch core: detection, filtering, paced delivery and watermarks,
// tied together by the poll cycle and its timer.

pub mod detector;
pub mod dispatch;
pub mod filter;
pub mod poller;
pub mod scheduler;
pub mod watermark;

pub use detector::{detect_new, latest_id, Detection};
pub use dispatch::{DeliveryOutcome, Dispatcher};
pub use filter::{should_deliver, validate_pattern, ContentFilter, FilterError};
pub use poller::{CycleOutcome, CycleReport, PollSettings, Poller};
pub use watermark::WatermarkStore;
