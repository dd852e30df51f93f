pub mod result;
pub mod verifier;

pub use result::{VerifyResult, VerifyStatus, VerifySummary};
pub use verifier::{combine, SchemaVerifier};
