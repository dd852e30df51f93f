use crate::migrate::Migration;

mod m20240110_create_users_table;
mod m20240120_seed_channels;
mod m20240205_create_staff_shifts;
mod m20240301_extend_sales_channels;
mod m20240315_rename_users_created_at;

pub use m20240110_create_users_table::CreateUsersTable;
pub use m20240120_seed_channels::SeedChannels;
pub use m20240205_create_staff_shifts::CreateStaffShifts;
pub use m20240301_extend_sales_channels::ExtendSalesChannels;
pub use m20240315_rename_users_created_at::RenameUsersCreatedAt;

/// Migrations that still run on a legacy database being baselined.
pub const BASELINE_EXCLUSIONS: [&str; 1] = ["20240205_create_staff_shifts"];

/// Every migration, in execution order.
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateUsersTable),
        Box::new(SeedChannels),
        Box::new(CreateStaffShifts),
        Box::new(ExtendSalesChannels),
        Box::new(RenameUsersCreatedAt),
    ]
}
