pub mod actuals;
pub mod core;
pub mod drafts;
pub mod practical;
pub mod setup;
pub mod subjects;
