use std::collections::HashSet;
use thiserror::Error;

use crate::db::entities::{email_account, email_template};
use crate::email::draft::{CommonFields, Sender};
use crate::extraction::document::ExtractedDocument;

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("Please select at least one PDF")]
    NothingSelected,
    #[error("Please enter email subject and body")]
    MissingContent,
    #[error("Unknown document: {0}")]
    UnknownDocument(String),
    #[error("Duplicate document name: {0}")]
    DuplicateDocument(String),
}

/// Request-scoped working state for one generation run: the extracted
/// documents, which of them are chosen, and the editable message fields.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    documents: Vec<ExtractedDocument>,
    selected: Vec<String>,
    subject: String,
    body: String,
    sender: Option<Sender>,
}

impl Selection {
    pub fn new(documents: Vec<ExtractedDocument>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    fn contains(&self, filename: &str) -> bool {
        self.documents.iter().any(|d| d.filename == filename)
    }

    pub fn is_selected(&self, filename: &str) -> bool {
        self.selected.iter().any(|f| f == filename)
    }

    /// Flip a document in or out of the selection. Returns whether it is
    /// selected afterwards. Newly selected documents go to the end.
    pub fn toggle(&mut self, filename: &str) -> Result<bool, SelectionError> {
        if !self.contains(filename) {
            return Err(SelectionError::UnknownDocument(filename.to_string()));
        }
        if let Some(pos) = self.selected.iter().position(|f| f == filename) {
            self.selected.remove(pos);
            Ok(false)
        } else {
            self.selected.push(filename.to_string());
            Ok(true)
        }
    }

    /// Select `filename` if it is not selected yet
    pub fn select(&mut self, filename: &str) -> Result<(), SelectionError> {
        if !self.is_selected(filename) {
            self.toggle(filename)?;
        }
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.selected = self.documents.iter().map(|d| d.filename.clone()).collect();
    }

    /// Copy a template's subject and body into the working fields.
    /// No link to the template is kept.
    pub fn apply_template(&mut self, template: &email_template::Model) {
        self.subject = template.subject.clone();
        self.body = template.body.clone();
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn set_sender(&mut self, sender: Option<Sender>) {
        self.sender = sender;
    }

    pub fn use_account(&mut self, account: &email_account::Model) {
        self.sender = Sender::from_parts(Some(account.email.clone()), Some(account.name.clone()));
    }

    /// Validate the working state and hand out the selected documents in
    /// selection order together with the fields shared by every draft.
    pub fn prepare(&self) -> Result<(Vec<ExtractedDocument>, CommonFields), SelectionError> {
        if self.selected.is_empty() {
            return Err(SelectionError::NothingSelected);
        }
        if self.subject.trim().is_empty() || self.body.trim().is_empty() {
            return Err(SelectionError::MissingContent);
        }

        // Documents are addressed by filename
        let mut names = HashSet::new();
        if let Some(dup) = self.documents.iter().find(|d| !names.insert(d.filename.as_str())) {
            return Err(SelectionError::DuplicateDocument(dup.filename.clone()));
        }

        let documents = self
            .selected
            .iter()
            .filter_map(|name| self.documents.iter().find(|d| &d.filename == name))
            .cloned()
            .collect();

        Ok((
            documents,
            CommonFields {
                subject: self.subject.clone(),
                body_html: self.body.clone(),
                sender: self.sender.clone(),
            },
        ))
    }
}
