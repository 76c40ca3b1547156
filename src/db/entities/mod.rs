pub mod email_account;
pub mod email_template;
