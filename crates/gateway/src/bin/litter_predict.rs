use clap::Parser;
use common::setup_logging;
use gateway::{PredictOutcome, PredictRequest, Upload, build_predictor, config::get_configuration};
use inference::backend::ort::OrtBackend;
use std::path::PathBuf;

/// Run litter detection and quantification on local files
#[derive(Parser, Debug)]
#[command(name = "litter-predict", version)]
struct Args {
    /// Image or zip archive of images
    #[arg(long)]
    input: PathBuf,

    /// Blur faces before analysis
    #[arg(long)]
    face_detection: bool,

    /// Skip the detection plot
    #[arg(long)]
    no_pld_plot: bool,

    /// Skip the quantification plot
    #[arg(long)]
    no_plq_plot: bool,

    /// `Download` writes results to --out, `nextcloud` copies them with rclone
    #[arg(long, default_value = "Download")]
    output_type: String,

    /// Directory receiving downloaded results
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn content_type(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("zip") => "application/zip",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = get_configuration()?;
    setup_logging(settings.server.environment, settings.server.log_level);

    let original_filename = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let upload = Upload::new(original_filename, content_type(&args.input), &args.input);

    let request = PredictRequest {
        upload,
        face_detection: args.face_detection,
        pld_plot: !args.no_pld_plot,
        plq_plot: !args.no_plq_plot,
        output_type: args.output_type,
    };

    let predictor = build_predictor::<OrtBackend>(&settings)?;
    match predictor.predict(&request)? {
        PredictOutcome::Download {
            filename, bytes, ..
        } => {
            std::fs::create_dir_all(&args.out)?;
            let target = args.out.join(filename);
            std::fs::write(&target, bytes)?;
            println!("{}", target.display());
        }
        PredictOutcome::Uploaded { remote, files } => {
            tracing::info!(remote = %remote, files = files.len(), "Results uploaded");
            for file in files {
                println!("{file}");
            }
        }
        PredictOutcome::Nothing => {
            tracing::warn!("No output type selected, nothing was written");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::path::Path;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["litter-predict", "--input", "beach.jpg"]);
        assert_eq!(args.output_type, "Download");
        assert!(!args.no_pld_plot && !args.no_plq_plot && !args.face_detection);
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type(Path::new("batch.ZIP")), "application/zip");
        assert_eq!(content_type(Path::new("beach.jpg")), "image/jpeg");
        assert_eq!(content_type(Path::new("raw")), "application/octet-stream");
    }
}
