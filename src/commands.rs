//! One-shot commands: run a single action against the service and print it.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use mailscope::client::{
    has_allowed_extension, AnalysisClient, UploadFile, ATTACHMENT_EXTENSIONS, EMAIL_FILE_EXTENSIONS,
};
use mailscope::config::Config;
use mailscope::form::{AnalysisRequest, Feature, FeatureSelection, Scenario};
use mailscope::render::{render_fields, render_value, DownloadKind};

use crate::{Commands, FormArgs};

pub async fn run(command: Commands, config: &Config) -> Result<()> {
    let client = AnalysisClient::with_timeout(&config.api.base_url, config.api.timeout())
        .context("Failed to build HTTP client")?;

    match command {
        Commands::Analyze { form } => {
            let request = build_request(&form, config)?;
            let result = client.analyze(&request).await?;

            println!("Analysis Results");
            for line in render_fields(&result) {
                println!("{}: {}", line.label, line.value);
            }
        }
        Commands::Attachment { file } => {
            let upload = read_upload(&file, ATTACHMENT_EXTENSIONS)?;
            let analysis = client.analyze_attachment(&upload).await?;

            println!("Attachment Analysis Results");
            println!("{}", render_value(&analysis));
        }
        Commands::Metadata { file } => {
            let upload = read_upload(&file, EMAIL_FILE_EXTENSIONS)?;
            let metadata = client.extract_metadata(&upload).await?;

            println!("Email Metadata");
            println!("{}", render_value(&metadata));
        }
        Commands::DownloadJson { form, output } => {
            download(&client, DownloadKind::Json, &form, output, config).await?;
        }
        Commands::DownloadPdf { form, output } => {
            download(&client, DownloadKind::Pdf, &form, output, config).await?;
        }
    }

    Ok(())
}

async fn download(
    client: &AnalysisClient,
    kind: DownloadKind,
    form: &FormArgs,
    output: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let request = build_request(form, config)?;
    let download = client.download(kind, &request).await?;

    let dir = output.unwrap_or_else(|| config.ui.download_path());
    let path = download
        .save_to(&dir)
        .with_context(|| format!("Failed to save {} to {}", download.file_name(), dir.display()))?;

    println!("Saved {} ({}) to {}", download.file_name(), download.mime(), path.display());
    Ok(())
}

/// The allow-list is advisory here: other extensions are sent with a warning
fn read_upload(path: &Path, allowed: &[&str]) -> Result<UploadFile> {
    if !has_allowed_extension(path, allowed) {
        warn!(
            "{} is not one of the expected types ({}); uploading anyway",
            path.display(),
            allowed.join(", ")
        );
    }
    UploadFile::from_path(path).with_context(|| format!("Failed to read file {}", path.display()))
}

fn build_request(form: &FormArgs, config: &Config) -> Result<AnalysisRequest> {
    let email_content = match &form.body_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read email content from {}", path.display()))?,
        None if !io::stdin().is_terminal() => {
            let mut content = String::new();
            io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read email content from stdin")?;
            content
        }
        None => String::new(),
    };

    let scenario = match &form.scenario {
        Some(name) => name.parse::<Scenario>()?,
        None => config.form.default_scenario,
    };

    let features = resolve_features(config, &form.only, &form.disable)?;

    Ok(AnalysisRequest::new(email_content, features, scenario))
}

/// `--only` starts from nothing; otherwise start from the configured defaults
/// and apply `--disable`
fn resolve_features(config: &Config, only: &[String], disable: &[String]) -> Result<FeatureSelection> {
    if !only.is_empty() {
        let mut selection = FeatureSelection::all(false);
        for key in only {
            selection.set(key.parse::<Feature>()?, true);
        }
        return Ok(selection);
    }

    let mut selection = config.form.initial_features()?;
    for key in disable {
        selection.set(key.parse::<Feature>()?, false);
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_only_turns_everything_else_off() {
        let selection =
            resolve_features(&Config::default(), &keys(&["tone", "sentiment"]), &[]).unwrap();

        assert_eq!(selection.enabled_count(), 2);
        assert!(selection.is_enabled(Feature::Tone));
        assert!(selection.is_enabled(Feature::Sentiment));
    }

    #[test]
    fn test_disable_applies_on_top_of_config() {
        let mut config = Config::default();
        config.form.disabled_features = keys(&["clarity"]);

        let selection = resolve_features(&config, &[], &keys(&["bias_detection"])).unwrap();

        assert_eq!(selection.enabled_count(), 13);
        assert!(!selection.is_enabled(Feature::Clarity));
        assert!(!selection.is_enabled(Feature::BiasDetection));
    }

    #[test]
    fn test_unknown_feature_is_rejected() {
        let err = resolve_features(&Config::default(), &[], &keys(&["vibes"])).unwrap_err();
        assert_eq!(err.to_string(), "Unknown feature: vibes");
    }

    #[test]
    fn test_build_request_from_body_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = dir.path().join("email.txt");
        std::fs::write(&body, "Please confirm the meeting.").unwrap();

        let form = FormArgs {
            body_file: Some(body),
            scenario: Some("business proposal".to_string()),
            disable: keys(&["tone"]),
            only: Vec::new(),
        };
        let request = build_request(&form, &Config::default()).unwrap();

        assert_eq!(request.email_content, "Please confirm the meeting.");
        assert_eq!(request.scenario, Scenario::BusinessProposal);
        assert!(!request.features.is_enabled(Feature::Tone));
        assert_eq!(request.features.enabled_count(), 14);
    }
}
