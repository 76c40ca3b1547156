use anyhow::{Context, Result};
use lopdf::Document;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
            .expect("email pattern is a valid regex")
    })
}

/// Find every email address in `text`, dropping duplicates but keeping
/// the order in which addresses first appear.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    email_pattern()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|email| seen.insert(*email))
        .map(str::to_string)
        .collect()
}

/// Extract the text of every page of a PDF.
/// Pages whose content cannot be decoded are skipped.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<String> {
    let document = Document::load_mem(pdf_bytes).context("Failed to parse PDF")?;

    let mut text = String::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => tracing::debug!("Skipping page {}: {}", page_number, e),
        }
    }

    Ok(text)
}

/// Addresses found in a PDF. Unparseable PDFs yield no addresses.
pub fn emails_in_pdf(pdf_bytes: &[u8], label: &str) -> Vec<String> {
    match extract_text(pdf_bytes) {
        Ok(text) => extract_emails(&text),
        Err(e) => {
            tracing::error!("Error extracting text from {}: {:#}", label, e);
            Vec::new()
        }
    }
}
