pub mod accounts;
pub mod batch;
pub mod downloads;
pub mod drafts;
pub mod error;
pub mod extract;
pub mod form;
pub mod router;
pub mod templates;
