#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub(crate) strict_verify: bool,
    pub(crate) environment: String,
    pub(crate) database: String,
    pub(crate) baseline_exclusions: Vec<String>,
}
