pub mod constraints;
pub mod helpers;
pub mod rows;
pub mod schema;
