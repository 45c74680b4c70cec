use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{debug, info};
use thiserror::Error;

use crate::client::{
    AnalysisClient, ServiceError, UploadFile, ATTACHMENT_EXTENSIONS, EMAIL_FILE_EXTENSIONS,
};
use crate::config::{Config, ConfigError};
use crate::form::{AnalysisRequest, Feature, FeatureSelection, Scenario};
use crate::render::{render_fields, render_value, Download, DownloadKind, ResultLine};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Form,
    FileBrowser(UploadTarget),
    Help,
}

/// Widget that currently receives key input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Body,
    Features,
    Scenario,
    Attachment,
    EmailFile,
    Buttons,
}

impl Focus {
    const ORDER: [Focus; 6] = [
        Focus::Body,
        Focus::Features,
        Focus::Scenario,
        Focus::Attachment,
        Focus::EmailFile,
        Focus::Buttons,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// The two upload widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    Attachment,
    EmailFile,
}

impl UploadTarget {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            UploadTarget::Attachment => ATTACHMENT_EXTENSIONS,
            UploadTarget::EmailFile => EMAIL_FILE_EXTENSIONS,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            UploadTarget::Attachment => "Upload an attachment (PDF, DOCX, TXT)",
            UploadTarget::EmailFile => "Upload an email file (EML or MSG)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Analyze,
    DownloadJson,
    DownloadPdf,
}

impl Button {
    pub const ALL: [Button; 3] = [Button::Analyze, Button::DownloadJson, Button::DownloadPdf];

    pub fn label(&self) -> &'static str {
        match self {
            Button::Analyze => "Analyze Email",
            Button::DownloadJson => "Download JSON Analysis",
            Button::DownloadPdf => "Download PDF Analysis",
        }
    }
}

/// A request to the service, with its inputs already captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Analyze(AnalysisRequest),
    AnalyzeAttachment(PathBuf),
    ExtractMetadata(PathBuf),
    Download(DownloadKind, AnalysisRequest),
}

impl Action {
    pub fn describe(&self) -> String {
        match self {
            Action::Analyze(_) => "Analyzing email...".to_string(),
            Action::AnalyzeAttachment(path) => format!("Analyzing attachment {}...", path.display()),
            Action::ExtractMetadata(path) => format!("Extracting metadata from {}...", path.display()),
            Action::Download(kind, _) => format!("Requesting {} analysis...", kind.label()),
        }
    }
}

/// What the result panel shows after the last action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Empty,
    Analysis(Vec<ResultLine>),
    Attachment(String),
    Metadata(String),
    DownloadReady(String),
    Saved(PathBuf),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct FileItem {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub size: Option<u64>, // None for directories
}

/// List `dir` for the file browser: parent link, then directories, then files
/// whose extension is in `allowed`. Hidden entries are skipped.
pub fn list_directory(dir: &Path, allowed: &[&str]) -> std::io::Result<Vec<FileItem>> {
    let mut items = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if name.starts_with('.') {
            continue;
        }

        let is_directory = path.is_dir();
        if !is_directory && !crate::client::has_allowed_extension(&path, allowed) {
            continue;
        }

        let size = if is_directory {
            None
        } else {
            std::fs::metadata(&path).ok().map(|m| m.len())
        };

        items.push(FileItem {
            name,
            path,
            is_directory,
            size,
        });
    }

    // Directories first, then files, both alphabetically
    items.sort_by(|a, b| match (a.is_directory, b.is_directory) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });

    if let Some(parent) = dir.parent() {
        items.insert(
            0,
            FileItem {
                name: "..".to_string(),
                path: parent.to_path_buf(),
                is_directory: true,
                size: None,
            },
        );
    }

    Ok(items)
}

pub struct App {
    pub config: Config,
    pub client: AnalysisClient,
    pub should_quit: bool,
    pub mode: AppMode,
    pub focus: Focus,

    // Form state
    pub email_content: String,
    pub features: FeatureSelection,
    pub scenario: Scenario,
    pub selected_feature_idx: usize,
    pub selected_button_idx: usize,
    pub attachment_path: Option<PathBuf>,
    pub email_file_path: Option<PathBuf>,

    // Results
    pub output: Output,
    pub pending_download: Option<Download>,
    pub busy: Option<String>,

    pub error_message: Option<String>,
    pub info_message: Option<String>,
    pub message_timeout: Option<Instant>,

    // File browser
    pub file_browser_items: Vec<FileItem>,
    pub file_browser_selected: usize,
    pub file_browser_current_path: PathBuf,
}

impl App {
    pub fn new(config: Config) -> AppResult<Self> {
        let features = config.form.initial_features()?;
        let scenario = config.form.default_scenario;
        let client = AnalysisClient::with_timeout(&config.api.base_url, config.api.timeout())?;

        info!("Using analysis service at {}", client.base_url());

        Ok(Self {
            config,
            client,
            should_quit: false,
            mode: AppMode::Form,
            focus: Focus::Body,

            email_content: String::new(),
            features,
            scenario,
            selected_feature_idx: 0,
            selected_button_idx: 0,
            attachment_path: None,
            email_file_path: None,

            output: Output::Empty,
            pending_download: None,
            busy: None,

            error_message: None,
            info_message: None,
            message_timeout: None,

            file_browser_items: Vec::new(),
            file_browser_selected: 0,
            file_browser_current_path: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    /// Capture the form as it is right now
    pub fn snapshot(&self) -> AnalysisRequest {
        AnalysisRequest::new(self.email_content.clone(), self.features, self.scenario)
    }

    pub fn selected_feature(&self) -> Feature {
        Feature::ALL[self.selected_feature_idx.min(Feature::COUNT - 1)]
    }

    pub fn selected_button(&self) -> Button {
        Button::ALL[self.selected_button_idx.min(Button::ALL.len() - 1)]
    }

    /// Handle one key press. Returns the action to dispatch, if the key
    /// triggered one.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> AppResult<Option<Action>> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        // Global keys
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return Ok(None);
            }
            KeyCode::Char('s') if ctrl => {
                self.save_pending_download();
                return Ok(None);
            }
            KeyCode::F(1) => {
                self.mode = if self.mode == AppMode::Help {
                    AppMode::Form
                } else {
                    AppMode::Help
                };
                return Ok(None);
            }
            _ => {}
        }

        match self.mode {
            AppMode::Form => self.handle_form_mode(key),
            AppMode::FileBrowser(target) => self.handle_file_browser_input(key, target),
            AppMode::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
                    self.mode = AppMode::Form;
                }
                Ok(None)
            }
        }
    }

    fn handle_form_mode(&mut self, key: KeyEvent) -> AppResult<Option<Action>> {
        match key.code {
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return Ok(None);
            }
            KeyCode::BackTab => {
                self.focus = self.focus.prev();
                return Ok(None);
            }
            KeyCode::F(5) => return Ok(Some(self.button_action(Button::Analyze))),
            KeyCode::F(6) => return Ok(Some(self.button_action(Button::DownloadJson))),
            KeyCode::F(7) => return Ok(Some(self.button_action(Button::DownloadPdf))),
            KeyCode::Char('q') if self.focus != Focus::Body => {
                self.should_quit = true;
                return Ok(None);
            }
            _ => {}
        }

        match self.focus {
            Focus::Body => {
                self.handle_body_input(key);
                Ok(None)
            }
            Focus::Features => {
                self.handle_features_input(key);
                Ok(None)
            }
            Focus::Scenario => {
                match key.code {
                    KeyCode::Right | KeyCode::Down | KeyCode::Char(' ') => {
                        self.scenario = self.scenario.next()
                    }
                    KeyCode::Left | KeyCode::Up => self.scenario = self.scenario.prev(),
                    _ => {}
                }
                Ok(None)
            }
            Focus::Attachment | Focus::EmailFile => {
                if key.code == KeyCode::Enter {
                    let target = if self.focus == Focus::Attachment {
                        UploadTarget::Attachment
                    } else {
                        UploadTarget::EmailFile
                    };
                    self.open_file_browser(target)?;
                }
                Ok(None)
            }
            Focus::Buttons => match key.code {
                KeyCode::Left => {
                    self.selected_button_idx = self.selected_button_idx.saturating_sub(1);
                    Ok(None)
                }
                KeyCode::Right => {
                    if self.selected_button_idx + 1 < Button::ALL.len() {
                        self.selected_button_idx += 1;
                    }
                    Ok(None)
                }
                KeyCode::Enter | KeyCode::Char(' ') => {
                    Ok(Some(self.button_action(self.selected_button())))
                }
                _ => Ok(None),
            },
        }
    }

    fn handle_body_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.email_content.push(c);
            }
            KeyCode::Enter => self.email_content.push('\n'),
            KeyCode::Backspace => {
                self.email_content.pop();
            }
            _ => {}
        }
    }

    fn handle_features_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => {
                self.selected_feature_idx = self.selected_feature_idx.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.selected_feature_idx + 1 < Feature::COUNT {
                    self.selected_feature_idx += 1;
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                let feature = self.selected_feature();
                self.features.toggle(feature);
                debug!("{} -> {}", feature, self.features.is_enabled(feature));
            }
            KeyCode::Char('a') => self.features = FeatureSelection::all(true),
            KeyCode::Char('n') => self.features = FeatureSelection::all(false),
            _ => {}
        }
    }

    /// Every button takes its own snapshot of the form
    fn button_action(&self, button: Button) -> Action {
        match button {
            Button::Analyze => Action::Analyze(self.snapshot()),
            Button::DownloadJson => Action::Download(DownloadKind::Json, self.snapshot()),
            Button::DownloadPdf => Action::Download(DownloadKind::Pdf, self.snapshot()),
        }
    }

    fn open_file_browser(&mut self, target: UploadTarget) -> AppResult<()> {
        let last = match target {
            UploadTarget::Attachment => &self.attachment_path,
            UploadTarget::EmailFile => &self.email_file_path,
        };
        if let Some(dir) = last.as_ref().and_then(|p| p.parent()) {
            self.file_browser_current_path = dir.to_path_buf();
        }

        self.mode = AppMode::FileBrowser(target);
        self.load_file_browser_directory(target);
        self.file_browser_selected = 0;
        self.show_info("Navigate with ↑↓, Enter to select, Backspace for parent dir, Esc to cancel");
        Ok(())
    }

    fn handle_file_browser_input(
        &mut self,
        key: KeyEvent,
        target: UploadTarget,
    ) -> AppResult<Option<Action>> {
        match key.code {
            KeyCode::Esc => {
                self.mode = AppMode::Form;
                self.show_info("File browser cancelled");
            }
            KeyCode::Up => {
                self.file_browser_selected = self.file_browser_selected.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.file_browser_selected + 1 < self.file_browser_items.len() {
                    self.file_browser_selected += 1;
                }
            }
            KeyCode::Backspace => {
                if let Some(parent) = self.file_browser_current_path.parent() {
                    self.file_browser_current_path = parent.to_path_buf();
                    self.load_file_browser_directory(target);
                    self.file_browser_selected = 0;
                }
            }
            KeyCode::Enter => {
                let Some(item) = self.file_browser_items.get(self.file_browser_selected).cloned() else {
                    return Ok(None);
                };

                if item.is_directory {
                    self.file_browser_current_path = item.path;
                    self.load_file_browser_directory(target);
                    self.file_browser_selected = 0;
                } else {
                    // Picking a file fires its upload straight away
                    self.mode = AppMode::Form;
                    return Ok(Some(self.select_upload(target, item.path)));
                }
            }
            _ => {}
        }
        Ok(None)
    }

    /// Record the chosen file for a widget and build its upload action
    pub fn select_upload(&mut self, target: UploadTarget, path: PathBuf) -> Action {
        debug!("Selected {} for {:?}", path.display(), target);
        match target {
            UploadTarget::Attachment => {
                self.attachment_path = Some(path.clone());
                Action::AnalyzeAttachment(path)
            }
            UploadTarget::EmailFile => {
                self.email_file_path = Some(path.clone());
                Action::ExtractMetadata(path)
            }
        }
    }

    fn load_file_browser_directory(&mut self, target: UploadTarget) {
        debug!("Loading directory: {}", self.file_browser_current_path.display());

        match list_directory(&self.file_browser_current_path, target.extensions()) {
            Ok(items) => {
                debug!("Found {} items in directory", items.len());
                self.file_browser_items = items;
            }
            Err(e) => {
                self.file_browser_items.clear();
                self.show_error(&format!("Failed to read directory: {}", e));
                self.mode = AppMode::Form;
            }
        }
    }

    /// Mark the app as waiting on `action` so the next draw can show it
    pub fn begin(&mut self, action: &Action) {
        self.busy = Some(action.describe());
    }

    /// Send one request and replace the output panel with its outcome
    pub async fn dispatch(&mut self, action: Action) {
        self.busy = Some(action.describe());
        self.pending_download = None;

        let outcome = match action {
            Action::Analyze(request) => self
                .client
                .analyze(&request)
                .await
                .map(|result| Output::Analysis(render_fields(&result))),
            Action::AnalyzeAttachment(path) => match UploadFile::from_path(&path) {
                Ok(file) => self
                    .client
                    .analyze_attachment(&file)
                    .await
                    .map(|value| Output::Attachment(render_value(&value))),
                Err(e) => {
                    self.busy = None;
                    self.fail(format!("Failed to read file {}: {}", path.display(), e));
                    return;
                }
            },
            Action::ExtractMetadata(path) => match UploadFile::from_path(&path) {
                Ok(file) => self
                    .client
                    .extract_metadata(&file)
                    .await
                    .map(|value| Output::Metadata(render_value(&value))),
                Err(e) => {
                    self.busy = None;
                    self.fail(format!("Failed to read file {}: {}", path.display(), e));
                    return;
                }
            },
            Action::Download(kind, request) => {
                self.client.download(kind, &request).await.map(|download| {
                    let description = download.describe();
                    self.pending_download = Some(download);
                    Output::DownloadReady(description)
                })
            }
        };

        self.busy = None;
        match outcome {
            Ok(output) => {
                self.error_message = None;
                self.output = output;
                if let Output::DownloadReady(description) = &self.output {
                    let message = format!("{} ready, press Ctrl+S to save", description);
                    self.show_info(&message);
                }
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    fn fail(&mut self, message: String) {
        self.show_error(&message);
        self.output = Output::Error(message);
    }

    /// Write the last downloaded artifact into the download directory
    pub fn save_pending_download(&mut self) {
        let Some(download) = self.pending_download.take() else {
            self.show_error("No download ready");
            return;
        };

        let dir = self.config.ui.download_path();
        match download.save_to(&dir) {
            Ok(path) => {
                info!("Saved {} to {}", download.file_name(), path.display());
                self.show_info(&format!("Saved {}", path.display()));
                self.output = Output::Saved(path);
            }
            Err(e) => {
                self.show_error(&format!("Failed to save {}: {}", download.file_name(), e));
                self.pending_download = Some(download);
            }
        }
    }

    pub fn show_error(&mut self, message: &str) {
        self.error_message = Some(message.to_string());
        self.message_timeout = Some(Instant::now() + Duration::from_secs(5));
    }

    pub fn show_info(&mut self, message: &str) {
        self.info_message = Some(message.to_string());
        self.message_timeout = Some(Instant::now() + Duration::from_secs(3));
    }

    pub fn tick(&mut self) -> AppResult<()> {
        // Clear messages after timeout
        if let Some(timeout) = self.message_timeout {
            if Instant::now() > timeout {
                self.error_message = None;
                self.info_message = None;
                self.message_timeout = None;
            }
        }

        Ok(())
    }
}
