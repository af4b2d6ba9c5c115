//! Per-file processing: parse → index → analyse → persist.
//!
//! Batches run the same steps file by file; one failure never stops the rest.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::agent::ContractAgent;
use crate::config::Config;
use crate::error::AppError;
use crate::llm::{LlmProvider, providers};
use crate::parser::{self, ParseError};
use crate::store::analysis::AnalysisStore;
use crate::store::chunks::ChunkStore;
use crate::store::sha256_hex;

/// Characters of extracted text echoed to the debug log.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A fresh analysis was written to `output`.
    Analyzed { output: PathBuf, chunks: usize },
    /// The stored analysis already matches this content; nothing was called.
    Unchanged { output: PathBuf },
}

impl ProcessOutcome {
    pub fn output(&self) -> &Path {
        match self {
            ProcessOutcome::Analyzed { output, .. } | ProcessOutcome::Unchanged { output } => output,
        }
    }
}

/// Result for one file of a batch.
#[derive(Debug)]
pub struct BatchItem {
    /// File name as given on the command line.
    pub name: String,
    pub result: Result<ProcessOutcome, AppError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.items.iter().filter(|item| item.result.is_err()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    chunks: ChunkStore,
    agent: ContractAgent,
    analyses: AnalysisStore,
    force: bool,
}

impl Pipeline {
    pub fn new(chunks: ChunkStore, agent: ContractAgent, analyses: AnalysisStore) -> Self {
        Self { chunks, agent, analyses, force: false }
    }

    /// Open both stores and build the configured LLM back end.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let provider = providers::build(&config.llm, config.llm_api_key.clone())?;
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: &Config, provider: LlmProvider) -> Result<Self, AppError> {
        let chunks = ChunkStore::open(
            &config.store.dir,
            config.store.chunk_size,
            config.store.chunk_overlap,
        )?;
        let analyses = AnalysisStore::open(&config.analysis.output_dir)?;
        let agent = ContractAgent::new(provider, &config.analysis, &config.llm);
        Ok(Self::new(chunks, agent, analyses))
    }

    /// Re-analyse even when the stored record matches the content hash.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn analyses(&self) -> &AnalysisStore {
        &self.analyses
    }

    pub async fn process_file(&self, path: &Path) -> Result<ProcessOutcome, AppError> {
        let doc_id = doc_id_of(path)?;

        let parse_path = path.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || parser::parse_document_detailed(&parse_path)).await??;
        if parsed.text.is_empty() {
            return Err(ParseError::NoText(path.display().to_string()).into());
        }
        info!(
            doc_id = %doc_id,
            method = parsed.method,
            words = parsed.word_count,
            "text extracted"
        );

        let text = parsed.text;
        let content_hash = sha256_hex(&text);
        if !self.force && self.analyses.is_current(&doc_id, &content_hash) {
            info!(doc_id = %doc_id, "content unchanged, skipping analysis");
            return Ok(ProcessOutcome::Unchanged { output: self.analyses.path_for(&doc_id)? });
        }

        debug!(doc_id = %doc_id, preview = %preview(&text), "extracted text preview");

        let chunks = {
            let store = self.chunks.clone();
            let doc_id = doc_id.clone();
            let text = text.clone();
            let hash = content_hash.clone();
            tokio::task::spawn_blocking(move || store.index_document(&doc_id, &text, &hash)).await??
        };

        let analysis = self.agent.analyze(&text, &doc_id).await?;

        let analyses = self.analyses.clone();
        let output = tokio::task::spawn_blocking(move || analyses.save(&analysis)).await??;
        info!(doc_id = %doc_id, path = %output.display(), chunks, "analysis saved");

        Ok(ProcessOutcome::Analyzed { output, chunks })
    }

    /// Process `files` in order. With `stage_into`, each file is first copied
    /// into that directory and the copy is processed.
    pub async fn process_batch(&self, files: &[PathBuf], stage_into: Option<&Path>) -> BatchReport {
        let mut report = BatchReport::default();
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());

            let result = match stage_into {
                Some(dir) => match stage_upload(file, dir) {
                    Ok(staged) => self.process_file(&staged).await,
                    Err(e) => Err(e),
                },
                None => self.process_file(file).await,
            };
            if let Err(e) = &result {
                warn!(file = %name, error = %e, "batch item failed");
            }
            report.items.push(BatchItem { name, result });
        }
        report
    }
}

/// Copy `file` into `uploads_dir` and return the copy's path. A file that
/// already lives there is returned as is.
pub fn stage_upload(file: &Path, uploads_dir: &Path) -> Result<PathBuf, AppError> {
    let name = file
        .file_name()
        .ok_or_else(|| AppError::Config(format!("not a file: {}", file.display())))?;
    fs::create_dir_all(uploads_dir)?;
    let dest = uploads_dir.join(name);
    if dest != file {
        fs::copy(file, &dest)?;
    }
    Ok(dest)
}

/// A document is identified by its file name.
pub fn doc_id_of(path: &Path) -> Result<String, AppError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Store(format!("no file name in path {}", path.display())))
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::scripted::ScriptedProvider;
    use tempfile::TempDir;

    const MSA: &str = "MASTER SERVICES AGREEMENT. Either party may terminate for convenience. \
        Vendor shall indemnify Customer. Both parties keep information confidential.";

    fn script() -> ScriptedProvider {
        ScriptedProvider::new(vec![
            ("Classify", Ok("MSA")),
            ("Extract", Ok("clause text")),
            ("Rate the *Indemnity*", Ok("High - uncapped")),
            ("Rate", Ok("Low")),
            ("Summarize", Ok("An MSA.")),
        ])
    }

    fn setup() -> (TempDir, Config, ScriptedProvider, Pipeline) {
        let tmp = TempDir::new().unwrap();
        let config = Config::test_default(tmp.path());
        let s = script();
        let pipeline = Pipeline::with_provider(&config, LlmProvider::Scripted(s.clone())).unwrap();
        (tmp, config, s, pipeline)
    }

    fn upload(config: &Config, name: &str, body: &str) -> PathBuf {
        fs::create_dir_all(&config.watcher.uploads_dir).unwrap();
        let p = config.watcher.uploads_dir.join(name);
        fs::write(&p, body).unwrap();
        p
    }

    #[tokio::test]
    async fn analyzes_and_persists() {
        let (_tmp, config, s, pipeline) = setup();
        let path = upload(&config, "msa.txt", MSA);

        let outcome = pipeline.process_file(&path).await.unwrap();
        let ProcessOutcome::Analyzed { output, chunks } = outcome else {
            panic!("expected Analyzed, got {outcome:?}");
        };
        assert_eq!(output, config.analysis.output_dir.join("msa.txt.json"));
        assert!(chunks >= 1);
        // 1 classify + 3 clauses + 3 risks + 1 summary
        assert_eq!(s.calls().len(), 8);

        let saved = pipeline.analyses().load("msa.txt").unwrap();
        assert_eq!(saved.doc_id, "msa.txt");
        assert_eq!(saved.overall_risk, crate::agent::RiskLevel::High);
        assert_eq!(saved.content_hash, sha256_hex(MSA));

        let hits = pipeline.chunks().search("indemnify", 3).unwrap();
        assert_eq!(hits[0].doc_id, "msa.txt");
    }

    #[tokio::test]
    async fn unchanged_content_skips_llm() {
        let (_tmp, config, s, pipeline) = setup();
        let path = upload(&config, "msa.txt", MSA);
        pipeline.process_file(&path).await.unwrap();
        let before = s.calls().len();

        let second = pipeline.process_file(&path).await.unwrap();
        assert!(matches!(second, ProcessOutcome::Unchanged { .. }));
        assert_eq!(s.calls().len(), before);
    }

    #[tokio::test]
    async fn force_reanalyzes() {
        let (_tmp, config, s, pipeline) = setup();
        let path = upload(&config, "msa.txt", MSA);
        pipeline.process_file(&path).await.unwrap();

        let forced = pipeline.clone().with_force(true);
        let outcome = forced.process_file(&path).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Analyzed { .. }));
        assert_eq!(s.calls().len(), 16);
    }

    #[tokio::test]
    async fn changed_content_reanalyzes() {
        let (_tmp, config, _s, pipeline) = setup();
        let path = upload(&config, "msa.txt", MSA);
        pipeline.process_file(&path).await.unwrap();
        fs::write(&path, "A different master services agreement.").unwrap();
        let outcome = pipeline.process_file(&path).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Analyzed { .. }));
    }

    #[tokio::test]
    async fn empty_document_is_an_error() {
        let (_tmp, config, s, pipeline) = setup();
        let path = upload(&config, "blank.txt", "  \n ");
        let err = pipeline.process_file(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Parse(ParseError::NoText(_))));
        assert!(s.calls().is_empty());
        assert!(pipeline.analyses().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_file_is_an_error() {
        let (_tmp, config, _s, pipeline) = setup();
        let path = upload(&config, "sheet.xlsx", "x");
        let err = pipeline.process_file(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Parse(ParseError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn llm_failure_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = Config::test_default(tmp.path());
        let failing = ScriptedProvider::new(vec![("Classify", Err("503 from upstream"))]);
        let pipeline = Pipeline::with_provider(&config, LlmProvider::Scripted(failing)).unwrap();
        let path = upload(&config, "nda.txt", "NDA body");

        let err = pipeline.process_file(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Agent(_)));
        assert!(pipeline.analyses().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_copies_into_uploads_and_counts_failures() {
        let (tmp, config, _s, pipeline) = setup();
        let outside = tmp.path().join("incoming");
        fs::create_dir_all(&outside).unwrap();
        let good = outside.join("msa.txt");
        fs::write(&good, MSA).unwrap();
        let blank = outside.join("blank.txt");
        fs::write(&blank, " ").unwrap();
        let missing = outside.join("missing.txt");

        let files = vec![good.clone(), blank, missing, outside.join("msa.txt")];
        let report = pipeline
            .process_batch(&files, Some(&config.watcher.uploads_dir))
            .await;

        assert_eq!(report.items.len(), 4);
        assert_eq!(report.failed(), 2);
        assert!(!report.all_succeeded());
        assert!(matches!(report.items[0].result, Ok(ProcessOutcome::Analyzed { .. })));
        assert!(matches!(
            report.items[1].result,
            Err(AppError::Parse(ParseError::NoText(_)))
        ));
        assert!(matches!(report.items[2].result, Err(AppError::Io(_))));
        assert!(matches!(report.items[3].result, Ok(ProcessOutcome::Unchanged { .. })));
        assert_eq!(report.items[2].name, "missing.txt");

        let copied = config.watcher.uploads_dir.join("msa.txt");
        assert_eq!(fs::read_to_string(&copied).unwrap(), MSA);
        assert!(good.exists());
    }

    #[tokio::test]
    async fn batch_without_staging_processes_in_place() {
        let (tmp, config, _s, pipeline) = setup();
        let path = tmp.path().join("msa.txt");
        fs::write(&path, MSA).unwrap();

        let report = pipeline.process_batch(&[path], None).await;
        assert!(report.all_succeeded());
        assert!(!config.watcher.uploads_dir.join("msa.txt").exists());
        assert_eq!(pipeline.analyses().list().unwrap(), vec!["msa.txt.json"]);
    }

    #[test]
    fn staging_a_file_already_in_uploads_keeps_it() {
        let tmp = TempDir::new().unwrap();
        let uploads = tmp.path().join("uploads");
        fs::create_dir_all(&uploads).unwrap();
        let inside = uploads.join("nda.txt");
        fs::write(&inside, "NDA").unwrap();
        assert_eq!(stage_upload(&inside, &uploads).unwrap(), inside);
        assert_eq!(fs::read_to_string(&inside).unwrap(), "NDA");
    }

    #[test]
    fn preview_is_char_bounded() {
        let long = "é".repeat(500);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS);
    }
}
