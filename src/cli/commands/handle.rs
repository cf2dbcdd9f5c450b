//! handle command - Process a tag-created webhook payload

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result};

use super::{build_handler, finish};
use crate::cli::Context;
use crate::engine::{TriggerEvent, TriggerReport};

/// Read the payload from `path`, or stdin for `-`.
pub fn read_event(path: &Path) -> Result<TriggerEvent> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read event from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file '{}'", path.display()))?
    };
    TriggerEvent::from_json(&text).context("Event payload is not a valid webhook object")
}

/// Handle one event and print the report.
pub fn handle(
    ctx: &Context,
    event: &Path,
    dry_run: bool,
    timeout_secs: Option<u64>,
) -> Result<ExitCode> {
    let event = read_event(event)?;

    // Benign events need neither a token nor the network.
    if let Err(message) = event.target() {
        tracing::info!("{}", message);
        return finish(&TriggerReport::ignored(message));
    }

    let handler = build_handler(ctx, dry_run)?;
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        match timeout_secs {
            Some(secs) => handler
                .handle_with_deadline(event, Duration::from_secs(secs))
                .await
                .map_err(anyhow::Error::from),
            None => Ok(handler.handle(&event).await),
        }
    })?;

    finish(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_event_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ref": "1.2.0", "ref_type": "tag", "repository": {{"git_url": "git://github.com/baz/bar.git"}}}}"#
        )
        .unwrap();

        let event = read_event(file.path()).unwrap();
        assert!(event.is_tag_created());
        assert_eq!(event.ref_name, "1.2.0");
    }

    #[test]
    fn rejects_invalid_payload() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(read_event(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_error() {
        let err = read_event(Path::new("/nonexistent/delivery.json")).unwrap_err();
        assert!(err.to_string().contains("delivery.json"));
    }
}
