pub mod assertion;
pub mod candidates;
pub mod consensus;
pub mod dom;
pub mod errors;
pub mod generator;
pub mod model;
pub mod policy;
pub mod window;

pub use assertion::Assertion;
pub use errors::{PageStateError, PageStateResult};
pub use generator::PageStateGenerator;
pub use model::{
    AssertResult, DomAssertion, PageStateSnapshot, StateContribution, StateFingerprint, TimeWindow,
};
pub use policy::FingerprintPolicy;
pub use window::anchored_window;
