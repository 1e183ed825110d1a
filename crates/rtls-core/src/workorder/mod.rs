//! Work-order lifecycle: creation, tag reuse, and completion

mod state;
mod work_order;

pub use state::WorkOrderState;
pub use work_order::{WorkOrder, WorkOrderId, WorkOrderTag, WorkOrderTagId};
