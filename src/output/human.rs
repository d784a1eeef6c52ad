//! Human-readable output formatting

use super::formatter::Report;

pub fn format_human(report: &Report) -> String {
    match report {
        Report::Build(outcome) => {
            if outcome.built {
                format!("Built image {}", outcome.artifact)
            } else {
                format!("Image {} is up to date", outcome.artifact)
            }
        }
        Report::Run(outcome) => {
            let mut output = format!("Container {} finished: {}", outcome.artifact, outcome.exit);
            if outcome.interrupted {
                output.push_str(" (interrupted)");
            }
            output
        }
        Report::Clean(report) => {
            let Some(artifact) = &report.artifact else {
                return "Nothing to clean".to_string();
            };

            let mut output = format!("Cleaned {}\n", artifact);
            output.push_str(&format!(
                "  Containers removed: {}\n",
                report.removed_instances.len()
            ));
            output.push_str(&format!(
                "  Image removed:      {}\n",
                if report.image_removed { "yes" } else { "already absent" }
            ));
            output.push_str(&format!(
                "  Marker removed:     {}",
                if report.marker_removed { "yes" } else { "no" }
            ));
            for warning in &report.warnings {
                output.push_str(&format!("\n  Warning: {}", warning));
            }
            output
        }
        Report::Status(status) => {
            let built = match (&status.recorded_artifact, &status.built_at) {
                (Some(recorded), Some(at)) => format!("yes ({} at {})", recorded, at.to_rfc3339()),
                (Some(recorded), None) => format!("yes ({})", recorded),
                _ => "no".to_string(),
            };
            let definition = match &status.fingerprint {
                Some(fp) => fp.chars().take(12).collect::<String>(),
                None => "missing".to_string(),
            };
            format!(
                "Image Status\n\
                 ------------\n\
                 Image:      {}\n\
                 Marker:     {}\n\
                 Built:      {}\n\
                 Definition: {}\n\
                 Fresh:      {}",
                status.artifact,
                status.marker.display(),
                built,
                definition,
                if status.fresh { "yes" } else { "no" }
            )
        }
    }
}
