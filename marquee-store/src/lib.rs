pub mod app_config;
pub mod error;
pub mod database;
pub mod show_repo;
pub mod booking_repo;
pub mod movie_repo;
pub mod user_repo;
pub mod redis_repo;
pub mod job_queue;
pub mod events;
pub mod stripe;
pub mod webhook;
pub mod tmdb;
pub mod mailer;

pub use booking_repo::PgBookingLedger;
pub use database::DbClient;
pub use error::{StoreError, StoreResult};
pub use events::EventProducer;
pub use job_queue::{QueuedJob, RedisJobQueue};
pub use mailer::SmtpMailer;
pub use movie_repo::PgMovieStore;
pub use redis_repo::RedisClient;
pub use show_repo::PgShowStore;
pub use stripe::StripeCheckoutGateway;
pub use tmdb::TmdbCatalog;
pub use user_repo::PgUserDirectory;
