use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::database::{DatabaseConnection, FileSummary, ItemUpdate, Repository};
use crate::extraction::{Extractor, FileRecord, SourceFormat};
use crate::file_utils::FileManager;
use crate::masking::TagMasker;
use crate::merge::Merger;
use crate::providers::{build_provider, Provider};
use crate::translation::{
    BatchOrchestrator, Progress, RunRegistry, RunReport, RunScope, RunSettings, RunState,
    TranslationMemory,
};

// @module: Application controller for script translation

/// Per-process context: configuration, store, memory, provider and runs
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Files, items and memory rows
    repo: Repository,
    // @field: Translation memory over the repository
    memory: TranslationMemory,
    // @field: Active provider adapter
    provider: Arc<dyn Provider>,
    // @field: One run per file
    runs: RunRegistry,
}

impl Controller {
    // @method: Create a controller from configuration, opening the database
    pub fn with_config(config: Config) -> Result<Self> {
        let db_path = config.resolve_database_path()?;
        let db = DatabaseConnection::new(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        let provider = build_provider(&config.translation)?;
        Ok(Self::with_parts(config, Repository::new(db), provider))
    }

    // @method: Create a controller from ready-made parts
    pub fn with_parts(config: Config, repo: Repository, provider: Arc<dyn Provider>) -> Self {
        let memory = TranslationMemory::new(repo.clone(), config.translation.common.use_translation_memory);
        Self {
            config,
            repo,
            memory,
            provider,
            runs: RunRegistry::new(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Underlying repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Translation memory
    pub fn memory(&self) -> &TranslationMemory {
        &self.memory
    }

    fn extractor(&self) -> Extractor {
        Extractor::new(self.config.extraction.mode)
    }

    /// Store a source text and its dialogue as a new file
    pub async fn import_text(
        &self,
        name: &str,
        relative_path: &str,
        text: &str,
        format: SourceFormat,
    ) -> Result<FileRecord> {
        let record = self
            .extractor()
            .build_record(name, relative_path, text, format)
            .with_context(|| format!("Failed to extract dialogue from {}", name))?;
        self.repo.insert_file(&record).await?;
        info!("Imported {} ({} dialogue items)", name, record.items.len());
        Ok(record)
    }

    /// Import one file; `root` anchors its archive path
    pub async fn import_file<P: AsRef<Path>>(&self, path: P, root: Option<&Path>) -> Result<FileRecord> {
        let source = SourceFile::read(path.as_ref(), root)?;
        self.import_text(&source.name, &source.relative_path, &source.text, source.format)
            .await
    }

    /// Reuse the stored record of an unchanged file so a re-run resumes it;
    /// import the file otherwise
    pub async fn open_file<P: AsRef<Path>>(&self, path: P, root: Option<&Path>) -> Result<FileRecord> {
        let source = SourceFile::read(path.as_ref(), root)?;
        let hash = FileRecord::hash_text(&source.text);

        if let Some(stored) = self.repo.find_file(&source.relative_path, &hash).await? {
            let fresh = self
                .extractor()
                .build_record(&source.name, &source.relative_path, &source.text, source.format)
                .with_context(|| format!("Failed to extract dialogue from {}", source.name))?;
            if same_spans(&stored, &fresh) {
                debug!("Resuming stored file {} ({})", stored.relative_path, stored.id);
                return Ok(stored);
            }
        }

        self.import_text(&source.name, &source.relative_path, &source.text, source.format)
            .await
    }

    /// Import every supported file below a directory
    pub async fn import_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<FileRecord>> {
        let dir = dir.as_ref();
        let mut records = Vec::new();
        for path in FileManager::find_script_files(dir)? {
            records.push(self.import_file(&path, Some(dir)).await?);
        }
        Ok(records)
    }

    /// Cancel any run on the file and delete it with its items
    pub async fn remove_file(&self, file_id: &str) -> Result<bool> {
        let _guard = self.runs.begin(file_id).await;
        self.repo.delete_file(file_id).await
    }

    /// Summaries of every stored file
    pub async fn list_files(&self) -> Result<Vec<FileSummary>> {
        self.repo.list_files().await
    }

    /// Run the orchestrator over a file, replacing any run already on it
    pub async fn translate<P>(&self, file_id: &str, scope: RunScope, on_progress: P) -> Result<RunReport>
    where
        P: Fn(Progress) + Send + Sync,
    {
        let guard = self.runs.begin(file_id).await;
        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&self.provider),
            self.repo.clone(),
            self.memory.clone(),
            RunSettings::from_config(&self.config),
        );
        orchestrator
            .run(file_id, &scope, guard.token(), on_progress)
            .await
    }

    /// Cancel the run on a file, if any
    pub fn cancel(&self, file_id: &str) -> bool {
        self.runs.cancel(file_id)
    }

    /// Whether a run is active on a file
    pub fn is_running(&self, file_id: &str) -> bool {
        self.runs.is_running(file_id)
    }

    /// Set or clear one item's translation by hand.
    ///
    /// A new text is also recorded in the translation memory, masked with
    /// the item's own tokens.
    pub async fn edit_translation(&self, item_id: &str, text: Option<String>) -> Result<bool> {
        let Some(item) = self.repo.get_item(item_id).await? else {
            return Ok(false);
        };

        let memory = match &text {
            Some(text) if self.memory.is_enabled() => {
                let masked = TagMasker::remask(text, &item.placeholder_map);
                vec![TranslationMemory::entry(&self.config.target_language, &item.masked_quote, &masked)]
            }
            _ => Vec::new(),
        };

        self.repo
            .commit_batch(vec![ItemUpdate::now(item_id, text)], memory)
            .await?;
        Ok(true)
    }

    /// Source with every translation spliced in
    pub async fn render(&self, file_id: &str) -> Result<String> {
        let record = self.stored_file(file_id).await?;
        Ok(Merger::render(&record)?)
    }

    /// Write `<stem>.<lang>.<ext>` into `output_dir`
    pub async fn export_file<P: AsRef<Path>>(&self, file_id: &str, output_dir: P) -> Result<PathBuf> {
        let record = self.stored_file(file_id).await?;
        let text = Merger::render(&record)?;
        let output_path =
            FileManager::generate_output_path(&record.name, output_dir, &self.config.target_language);
        FileManager::write_atomic(&output_path, &text)?;
        info!("Wrote {}", output_path.display());
        Ok(output_path)
    }

    /// Bundle the rendered files into a zip under their relative paths
    pub async fn export_archive<P: AsRef<Path>>(&self, file_ids: &[String], path: P) -> Result<usize> {
        let mut entries = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            let record = self.stored_file(file_id).await?;
            let text = Merger::render(&record)?;
            entries.push((record.relative_path.clone(), text));
        }
        FileManager::write_archive(path.as_ref(), &entries)?;
        info!("Wrote {} files to {}", entries.len(), path.as_ref().display());
        Ok(entries.len())
    }

    async fn stored_file(&self, file_id: &str) -> Result<FileRecord> {
        self.repo
            .get_file(file_id)
            .await?
            .ok_or_else(|| anyhow!("Unknown file: {}", file_id))
    }

    /// Import, translate and write one script next to `output_dir`
    pub async fn run(&self, input_file: PathBuf, output_dir: PathBuf, force_overwrite: bool) -> Result<()> {
        if !input_file.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        let output_path =
            FileManager::generate_output_path(&input_file, &output_dir, &self.config.target_language);
        if output_path.exists() && !force_overwrite {
            warn!("Skipping file, translation already exists (use -f to force overwrite)");
            return Ok(());
        }

        let record = self.open_file(&input_file, None).await?;
        let report = self.translate_with_progress(&record).await?;
        if report.state != RunState::Completed {
            return Err(anyhow!("Translation of {} {}", record.name, report));
        }
        self.export_file(&record.id, &output_dir).await?;
        Ok(())
    }

    /// Translate every script under a directory; optionally bundle them
    pub async fn run_folder(
        &self,
        input_dir: PathBuf,
        output_dir: PathBuf,
        archive: Option<PathBuf>,
        force_overwrite: bool,
    ) -> Result<()> {
        if !input_dir.is_dir() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let target_language = &self.config.target_language;
        let mut records = Vec::new();
        let mut skip_count = 0;
        for path in FileManager::find_script_files(&input_dir)? {
            // Our own earlier output
            if FileManager::is_localized_output(&path, target_language) {
                continue;
            }

            if archive.is_none() {
                let relative = FileManager::relative_path(&input_dir, &path);
                let output_path = FileManager::generate_output_path(
                    &relative,
                    output_dir.join(&relative).parent().unwrap_or(&output_dir),
                    target_language,
                );
                if output_path.exists() && !force_overwrite {
                    warn!("Skipping {}, translation already exists (use -f to force overwrite)", relative);
                    skip_count += 1;
                    continue;
                }
            }

            records.push(self.open_file(&path, Some(input_dir.as_path())).await?);
        }

        if records.is_empty() {
            if skip_count == 0 {
                warn!("No script files found in {:?}", input_dir);
            }
            return Ok(());
        }

        let mut completed = Vec::new();
        for record in &records {
            let report = self.translate_with_progress(record).await?;
            if report.state == RunState::Completed {
                completed.push(record.id.clone());
            } else {
                error!("{}: {}", record.relative_path, report);
            }
        }

        match archive {
            Some(path) => {
                self.export_archive(&completed, &path).await?;
            }
            None => {
                for file_id in &completed {
                    let record = self.stored_file(file_id).await?;
                    let target = output_dir.join(&record.relative_path);
                    let dir = target.parent().map(Path::to_path_buf).unwrap_or_else(|| output_dir.clone());
                    self.export_file(file_id, dir).await?;
                }
            }
        }

        info!(
            "Translated {} of {} files ({} skipped)",
            completed.len(),
            records.len(),
            skip_count
        );
        if completed.len() < records.len() {
            return Err(anyhow!("{} files failed to translate", records.len() - completed.len()));
        }
        Ok(())
    }

    async fn translate_with_progress(&self, record: &FileRecord) -> Result<RunReport> {
        let progress_bar = ProgressBar::new(record.items.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lines ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message(record.name.clone());

        let report = self
            .translate(&record.id, RunScope::Missing, |progress| {
                progress_bar.set_length(progress.total as u64);
                progress_bar.set_position(progress.done as u64);
            })
            .await;

        progress_bar.finish_and_clear();
        let report = report?;
        info!("{}: {}", record.name, report);
        Ok(report)
    }
}

/// A source file read from disk, ready for import
struct SourceFile {
    name: String,
    relative_path: String,
    text: String,
    format: SourceFormat,
}

impl SourceFile {
    fn read(path: &Path, root: Option<&Path>) -> Result<Self> {
        let format = SourceFormat::from_path(path)?;
        let text = FileManager::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let relative_path = match root {
            Some(root) => FileManager::relative_path(root, path),
            None => name.clone(),
        };
        Ok(Self { name, relative_path, text, format })
    }
}

/// Same dialogue spans, so stored items still line up with the source
fn same_spans(stored: &FileRecord, fresh: &FileRecord) -> bool {
    stored.format == fresh.format
        && stored.items.len() == fresh.items.len()
        && stored.items.iter().zip(&fresh.items).all(|(a, b)| {
            a.content_start == b.content_start && a.content_end == b.content_end && a.quote == b.quote
        })
}
