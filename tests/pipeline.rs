//! Offline pipeline tests.
//!
//! pdfium, tesseract and the remote model are replaced with in-process fakes
//! injected through `PipelineConfig`, so these run everywhere:
//!
//!   cargo test --test pipeline

use async_trait::async_trait;
use docnamer::document::{MIME_DOCX, MIME_PDF, MIME_PNG};
use docnamer::pipeline::llm::{CompletionBackend, CompletionRequest};
use docnamer::pipeline::ocr::{encode_png, OcrEngine, OcrError};
use docnamer::pipeline::pdf::{PageVisitor, PdfBackend};
use docnamer::{
    save_as, suggest_names, suggest_names_for_file, suggest_names_sync, ClassifyError,
    DocNamerError, ExtractError, ExtractionMethod, PipelineConfig, PipelineProgressCallback,
    RawDocument, Stage,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// PDF backend with a fixed text layer; counts calls to each tier.
struct FakePdf {
    pages: Vec<String>,
    text_calls: AtomicUsize,
    render_calls: AtomicUsize,
}

impl FakePdf {
    fn new(pages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            text_calls: AtomicUsize::new(0),
            render_calls: AtomicUsize::new(0),
        })
    }
}

impl PdfBackend for FakePdf {
    fn page_texts(&self, _bytes: &[u8], _pw: Option<&str>) -> Result<Vec<String>, ExtractError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.clone())
    }

    fn render_pages(
        &self,
        _bytes: &[u8],
        _pw: Option<&str>,
        _max_pixels: u32,
        max_pages: usize,
        visit: &mut PageVisitor<'_>,
    ) -> Result<usize, ExtractError> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        for idx in 0..self.pages.len().min(max_pages) {
            if visit(idx, self.pages.len(), Ok(DynamicImage::new_rgb8(2, 2))).is_break() {
                break;
            }
        }
        Ok(self.pages.len())
    }
}

/// OCR engine returning the same text for every image.
struct SpyOcr {
    text: String,
    calls: AtomicUsize,
}

impl SpyOcr {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

impl OcrEngine for SpyOcr {
    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// Completion backend returning a canned answer; records prompts.
struct StaticModel {
    answer: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StaticModel {
    fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn jane_doe() -> Arc<Self> {
        Self::new(
            "<think>Looks like a CV.</think>\n```json\n{\"document_type\": \"Resume\", \"candidate_name\": \"Jane Doe\", \"job_title\": \"\", \"company\": \"Acme Corp\"}\n```",
        )
    }
}

#[async_trait]
impl CompletionBackend for StaticModel {
    async fn complete(
        &self,
        _credential: &str,
        request: &CompletionRequest,
    ) -> Result<String, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = request.messages.first() {
            self.prompts.lock().unwrap().push(msg.content.clone());
        }
        Ok(self.answer.clone())
    }
}

#[derive(Default)]
struct StageLog {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for StageLog {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start {stage:?}"));
    }

    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ocr {page_num}/{total_pages}"));
    }

    fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
        self.events.lock().unwrap().push(format!("done {stage:?}"));
    }

    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.events.lock().unwrap().push(format!("error {stage:?}"));
    }
}

fn config(pdf: Arc<FakePdf>, ocr: Arc<SpyOcr>, model: Arc<StaticModel>) -> PipelineConfig {
    PipelineConfig::builder()
        .pdf_backend(pdf)
        .ocr_engine(ocr)
        .completion_backend(model)
        .build()
        .unwrap()
}

fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    use docx_rs::{Docx, Paragraph, Run};
    let mut docx = Docx::new();
    for p in paragraphs {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*p)));
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    docx.build().pack(&mut buf).unwrap();
    buf.into_inner()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_layer_pdf_produces_jane_doe_variants() {
    let pdf = FakePdf::new(&["Jane Doe\nSoftware Engineer", "Acme Corp"]);
    let ocr = SpyOcr::new("unused");
    let model = StaticModel::jane_doe();
    let cfg = config(pdf.clone(), ocr.clone(), model.clone());

    let doc = RawDocument::from_mime(&b"%PDF-1.7"[..], MIME_PDF, "scan.PDF");
    let report = suggest_names(&doc, "test-key", &cfg).await.unwrap();

    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0, "text layer must not reach OCR");
    assert_eq!(pdf.render_calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.extraction.method, ExtractionMethod::TextLayer);
    assert!(report.classification.is_ok());
    assert_eq!(
        report.variants,
        vec![
            "Jane_Doe__Acme_Corp_Resume.pdf",
            "Jane_Doe__Resume.pdf",
            "Jane_Doe_Acme_Corp_Resume.pdf",
            "Jane_Doe_Resume.pdf",
            "Resume__Acme_Corp.pdf",
        ]
    );
    assert_eq!(report.original_filename, "scan.PDF");

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Jane Doe\nSoftware Engineer\nAcme Corp"));
}

#[tokio::test]
async fn scanned_pdf_is_ocred_page_by_page() {
    let pdf = FakePdf::new(&["", "  ", "\n"]);
    let ocr = SpyOcr::new("Jane Doe");
    let model = StaticModel::jane_doe();
    let log = Arc::new(StageLog::default());
    let cfg = PipelineConfig::builder()
        .pdf_backend(pdf.clone())
        .ocr_engine(ocr.clone())
        .completion_backend(model)
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let doc = RawDocument::from_mime(&b"%PDF-1.7"[..], MIME_PDF, "scan.pdf");
    let report = suggest_names(&doc, "k", &cfg).await.unwrap();

    assert_eq!(ocr.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.extraction.method, ExtractionMethod::Ocr);
    assert_eq!(report.extraction.text, "Jane Doe\nJane Doe\nJane Doe");
    assert_eq!(report.extraction.ocr_pages, 3);

    let events = log.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start Extraction",
            "ocr 1/3",
            "ocr 2/3",
            "ocr 3/3",
            "done Extraction",
            "start Classification",
            "done Classification",
            "start Naming",
            "done Naming",
        ]
    );
}

#[tokio::test]
async fn images_skip_the_text_layer() {
    let pdf = FakePdf::new(&["should not be read"]);
    let ocr = SpyOcr::new("Cover letter from Ann Lee");
    let model = StaticModel::new(r#"{"document_type":"Cover_Letter","candidate_name":"Ann Lee"}"#);
    let cfg = config(pdf.clone(), ocr.clone(), model);

    let png = encode_png(&DynamicImage::new_rgb8(4, 4)).unwrap();
    let doc = RawDocument::from_mime(png, MIME_PNG, "IMG_2041.PNG");
    let report = suggest_names(&doc, "k", &cfg).await.unwrap();

    assert_eq!(pdf.text_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        report.variants,
        vec![
            "Ann_Lee___Cover_Letter.png",
            "Ann_Lee__Cover_Letter.png",
            "Ann_Lee__Cover_Letter.png",
            "Ann_Lee_Cover_Letter.png",
            "Cover_Letter__.png",
        ]
    );
}

#[tokio::test]
async fn missing_credential_skips_the_model() {
    let model = StaticModel::jane_doe();
    let cfg = config(FakePdf::new(&["Jane Doe"]), SpyOcr::new(""), model.clone());

    let doc = RawDocument::from_mime(&b"%PDF"[..], MIME_PDF, "cv.pdf");
    let report = suggest_names(&doc, "", &cfg).await.unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        report.classification.error,
        Some(ClassifyError::MissingCredential)
    );
    assert!(report.classification.record.is_empty());
    assert_eq!(report.variants[0], "Document___.pdf");
}

#[tokio::test]
async fn absent_name_key_gets_the_default_fallback() {
    let cfg = config(
        FakePdf::new(&["text"]),
        SpyOcr::new(""),
        StaticModel::new(r#"{"document_type":"Proposal","company":"Globex"}"#),
    );

    let doc = RawDocument::from_mime(&b"%PDF"[..], MIME_PDF, "p.pdf");
    let report = suggest_names(&doc, "k", &cfg).await.unwrap();

    assert_eq!(report.variants[0], "Document__Globex_Proposal.pdf");
    assert_eq!(report.variants.len(), 5);
    // The report keeps the record as the model returned it.
    assert_eq!(report.classification.record.candidate_name, "");
}

#[tokio::test]
async fn empty_name_is_kept_empty() {
    let cfg = config(
        FakePdf::new(&["text"]),
        SpyOcr::new(""),
        StaticModel::new(
            r#"{"document_type":"Proposal","candidate_name":"","job_title":"","company":"Globex"}"#,
        ),
    );

    let doc = RawDocument::from_mime(&b"%PDF"[..], MIME_PDF, "p.pdf");
    let report = suggest_names(&doc, "k", &cfg).await.unwrap();

    assert_eq!(report.variants, vec!["Proposal__Globex.pdf"]);
}

#[tokio::test]
async fn custom_fallback_name_and_opting_out() {
    let build = |fallback: Option<&str>| {
        let mut builder = PipelineConfig::builder()
            .pdf_backend(FakePdf::new(&["text"]))
            .ocr_engine(SpyOcr::new(""))
            .completion_backend(StaticModel::new("no json here"));
        builder = match fallback {
            Some(name) => builder.fallback_name(name),
            None => builder.without_fallback_name(),
        };
        builder.build().unwrap()
    };
    let doc = RawDocument::from_mime(&b"%PDF"[..], MIME_PDF, "a.pdf");

    let named = suggest_names(&doc, "k", &build(Some("Unknown"))).await.unwrap();
    assert_eq!(named.variants[0], "Unknown___.pdf");

    let bare = suggest_names(&doc, "k", &build(None)).await.unwrap();
    assert!(bare.variants.is_empty());
}

#[tokio::test]
async fn malformed_answer_is_reported_not_raised() {
    let cfg = config(
        FakePdf::new(&["text"]),
        SpyOcr::new(""),
        StaticModel::new("I'm not able to determine that."),
    );
    let doc = RawDocument::from_mime(&b"%PDF"[..], MIME_PDF, "a.pdf");
    let report = suggest_names(&doc, "k", &cfg).await.unwrap();

    assert_eq!(report.classification.error, Some(ClassifyError::NoJsonFound));
    assert_eq!(
        report.variants,
        vec!["Document___.pdf", "Document__.pdf", "Document__.pdf", "Document_.pdf"]
    );
}

#[tokio::test]
async fn unsupported_type_is_fatal_and_never_classified() {
    let model = StaticModel::jane_doe();
    let cfg = config(FakePdf::new(&[]), SpyOcr::new(""), model.clone());

    let doc = RawDocument::from_mime(&b"plain text"[..], "text/plain", "notes.txt");
    let err = suggest_names(&doc, "k", &cfg).await.unwrap_err();

    match err {
        DocNamerError::NoTextExtracted { issues } => {
            assert_eq!(
                issues,
                vec![ExtractError::UnsupportedType {
                    mime: "text/plain".into()
                }]
            );
        }
        other => panic!("expected NoTextExtracted, got {other}"),
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn docx_file_round_trip_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Document1.docx");
    std::fs::write(&path, docx_bytes(&["Jane Doe", "Senior Engineer at Acme Corp"])).unwrap();

    let model = StaticModel::new(
        r#"{"document_type":"Resume","candidate_name":"Jane Doe","job_title":"Senior Engineer","company":"Acme Corp"}"#,
    );
    let cfg = config(FakePdf::new(&[]), SpyOcr::new(""), model.clone());

    let report = suggest_names_for_file(path.to_str().unwrap(), None, "k", &cfg)
        .await
        .unwrap();
    assert_eq!(report.extraction.method, ExtractionMethod::Paragraphs);
    assert_eq!(report.extraction.text, "Jane Doe\nSenior Engineer at Acme Corp");
    assert_eq!(
        report.variants[0],
        "Jane_Doe_Senior_Engineer_Acme_Corp_Resume.docx"
    );

    let original = std::fs::read(&path).unwrap();
    let doc = RawDocument::from_mime(original.clone(), MIME_DOCX, "Document1.docx");
    let saved = save_as(&doc, &report.variants[0], dir.path().join("renamed"))
        .await
        .unwrap();
    assert_eq!(std::fs::read(saved).unwrap(), original);
}

#[test]
fn sync_wrapper_runs_outside_a_runtime() {
    let cfg = config(
        FakePdf::new(&["Jane Doe"]),
        SpyOcr::new(""),
        StaticModel::jane_doe(),
    );
    let doc = RawDocument::from_mime(&b"%PDF"[..], MIME_PDF, "cv.pdf");
    let report = suggest_names_sync(&doc, "k", &cfg).unwrap();
    assert_eq!(report.variants.len(), 5);
}

#[tokio::test]
async fn report_serialises_to_json() {
    let cfg = config(
        FakePdf::new(&["Jane Doe"]),
        SpyOcr::new(""),
        StaticModel::jane_doe(),
    );
    let doc = RawDocument::from_mime(&b"%PDF"[..], MIME_PDF, "cv.pdf");
    let report = suggest_names(&doc, "k", &cfg).await.unwrap();

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["classification"]["record"]["candidate_name"], "Jane Doe");
    assert_eq!(json["extraction"]["method"], "TextLayer");
    assert_eq!(json["variants"].as_array().unwrap().len(), 5);
}
