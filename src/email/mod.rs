pub mod composer;
pub mod draft;
