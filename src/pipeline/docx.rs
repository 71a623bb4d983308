//! Word-processing documents: read top-level paragraph text via docx-rs.
//!
//! Only body paragraphs are read. Tables, headers and footers are skipped:
//! the classifier needs the opening of the document, which lives in the
//! body paragraphs of every CV and letter template we have seen.

use crate::error::ExtractError;
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, Run, RunChild};
use tracing::debug;

/// Paragraph texts joined with `\n`, in document order.
///
/// Empty paragraphs are kept so blank lines survive.
pub fn paragraphs_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| ExtractError::Docx(e.to_string()))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .collect();

    debug!("Read {} paragraphs", paragraphs.len());
    Ok(paragraphs.join("\n"))
}

fn paragraph_text(para: &Paragraph) -> String {
    let mut out = String::new();
    for child in &para.children {
        push_child(child, &mut out);
    }
    out
}

fn push_child(child: &ParagraphChild, out: &mut String) {
    match child {
        ParagraphChild::Run(run) => push_run(run, out),
        ParagraphChild::Hyperlink(link) => {
            for inner in &link.children {
                push_child(inner, out);
            }
        }
        _ => {}
    }
}

fn push_run(run: &Run, out: &mut String) {
    for rc in &run.children {
        match rc {
            RunChild::Text(t) => out.push_str(&t.text),
            RunChild::Tab(_) => out.push('\t'),
            _ => {}
        }
    }
}
