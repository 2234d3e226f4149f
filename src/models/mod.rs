pub mod call_record;
pub mod classification;
pub mod session;
pub mod slot;
pub mod summary;

pub use call_record::CallRecord;
pub use classification::{Action, ClassificationResult, Intent};
pub use session::{CallSession, CallState, Speaker, TranscriptEntry};
pub use slot::{BusyInterval, BusyPeriod, EventRecord, EventTime, TimeSlot, TimeWindow};
pub use summary::CallSummary;
