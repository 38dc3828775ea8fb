pub mod schedule;
pub mod listing;
pub mod dashboard;

pub use schedule::{build_shows, AnnouncementDebouncer, ShowInput, ShowPlanner};
pub use listing::{MovieSchedule, ShowListing, ShowTime};
pub use dashboard::{AdminBooking, AdminShow, Dashboard, DashboardSummary};
