pub mod migration;
pub mod migration_options;
pub mod migration_result;
pub mod migrator;

pub use migration::Migration;
pub use migrator::MigrationOrchestrator;
