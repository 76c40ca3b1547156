pub mod orchestrator;
pub mod report;
pub mod selection;
pub mod sink;
