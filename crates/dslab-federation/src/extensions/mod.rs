pub mod bot_trace_reader;
pub mod report;
