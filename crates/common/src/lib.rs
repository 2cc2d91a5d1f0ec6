pub mod api;
pub mod error;
pub mod format;
pub mod job;
pub mod request;

mod de;

pub use api::{
    HealthResponse, PrintJobResponse, PrinterInfo, PrintersResponse, QueuesResponse, RoleConfigUpdate,
    RoleMap,
};
pub use error::{Error, Result};
pub use format::format_number;
pub use job::{Job, JobStatus, QueueState, QueueStatus};
pub use request::{
    Customer, LineItem, OutputFormat, Payment, PaymentMethod, PrintRequest, PrintRole, Settlement,
};
