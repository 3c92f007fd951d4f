mod counter;
mod pipeline;
mod queue;
mod reader;

pub use counter::PresenceCounter;
pub use pipeline::{count_distinct, count_file, CountSummary};
pub use queue::{batch_queue, BatchReceiver, BatchSender};
pub use reader::{LineReader, MIN_BUFFER_SIZE};
