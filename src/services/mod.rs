pub mod ai;
pub mod audio;
pub mod calendar;
pub mod clock;
pub mod orchestrator;
pub mod scheduling;
pub mod slot_matcher;
pub mod speech;
pub mod time_expression;
pub mod transcription;
