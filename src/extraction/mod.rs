pub mod document;
pub mod provider;
pub mod text;
