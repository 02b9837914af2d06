mod item;
mod report;
mod state;

pub use item::{BitHydraulics, NonProductiveTime, UpdateAttachment, WorkItem};
pub use report::RunReport;
pub use state::{ItemState, StateMachine, Workflow};
