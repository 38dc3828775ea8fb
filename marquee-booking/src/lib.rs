pub mod policy;
pub mod reservation;
pub mod orchestrator;
pub mod sweeper;
pub mod notifications;
pub mod user_sync;
pub mod dispatch;
pub mod memory;

pub use dispatch::{DispatchOutcome, JobDispatcher};
pub use orchestrator::{NotificationOutcome, PaymentOrchestrator};
pub use policy::ReservationPolicy;
pub use reservation::{Reservation, ReservationService};
pub use sweeper::{ExpirySweeper, SweepOutcome};
