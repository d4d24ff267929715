pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod memory;
pub mod spot_repo;
pub mod user_repo;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use spot_repo::PgSpotRepository;
pub use user_repo::PgUserRepository;
