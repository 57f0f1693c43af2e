//! Detect command - batch face detection over image files

use anyhow::{Context as _, Result};
use cascade_faces_common::{
    check_payload, DetectionResult, ProcessingError, DEFAULT_MAX_FILE_SIZE,
};
use cascade_faces_detection::{FaceDetectionConfig, FaceDetectionError, FaceDetector, MarkerShape};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Args)]
pub struct DetectCommand {
    /// Input image files (JPEG or PNG)
    #[arg(value_name = "IMAGES", required = true)]
    inputs: Vec<PathBuf>,

    /// Cascade model file
    #[arg(short, long)]
    model: PathBuf,

    /// YAML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Smallest window edge in pixels
    #[arg(long)]
    min_size: Option<u32>,

    /// Largest window edge in pixels
    #[arg(long)]
    max_size: Option<u32>,

    /// Grid step as a fraction of the window edge
    #[arg(long)]
    shift_factor: Option<f64>,

    /// Window growth per scale step
    #[arg(long)]
    scale_factor: Option<f64>,

    /// Overlap above which detections are merged
    #[arg(long)]
    iou_threshold: Option<f64>,

    /// Draw circles instead of rectangles
    #[arg(long)]
    circle: bool,

    /// Write the JSON results here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for annotated JPEG copies
    #[arg(long)]
    annotated_dir: Option<PathBuf>,

    /// Largest accepted input file in MiB
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE >> 20)]
    max_file_size_mb: u64,
}

impl DetectCommand {
    pub fn execute(self) -> Result<()> {
        info!("=== facefind detect ===");
        info!("Total input files: {}", self.inputs.len());

        let config = self.build_config()?;
        let detector = FaceDetector::from_file(&self.model, config)
            .with_context(|| format!("Failed to load cascade model {}", self.model.display()))?;

        let start_time = Instant::now();
        let max_bytes = self.max_file_size_mb.saturating_mul(1 << 20);

        // Rejected files keep their slot so results stay in input order
        let mut results: Vec<Option<Result<DetectionResult, FaceDetectionError>>> =
            Vec::with_capacity(self.inputs.len());
        let mut accepted = Vec::new();
        let mut slots = Vec::new();
        for path in &self.inputs {
            match load_input(path, max_bytes) {
                Ok(input) => {
                    slots.push(results.len());
                    results.push(None);
                    accepted.push(input);
                }
                Err(e) => {
                    warn!("Rejected {}: {}", path.display(), e);
                    results.push(Some(Err(e)));
                }
            }
        }

        for (slot, result) in slots.into_iter().zip(detector.process_batch(&accepted)) {
            results[slot] = Some(result);
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (path, result) in self.inputs.iter().zip(results.into_iter().flatten()) {
            match result {
                Ok(r) => succeeded.push(r),
                Err(e) => failed.push((path.display().to_string(), e)),
            }
        }

        if let Some(dir) = &self.annotated_dir {
            write_annotated(dir, &succeeded)?;
        }
        self.write_results(&succeeded)?;

        let total_faces: usize = succeeded.iter().map(|r| r.faces.len()).sum();
        info!("=== Summary ===");
        info!("Succeeded: {}", succeeded.len());
        info!("Failed: {}", failed.len());
        info!("Faces found: {}", total_faces);
        info!("Total time: {:.2}s", start_time.elapsed().as_secs_f64());
        for (path, e) in &failed {
            warn!("  {}: {}", path, e);
        }

        if !failed.is_empty() {
            anyhow::bail!("{} of {} images failed", failed.len(), self.inputs.len());
        }
        Ok(())
    }

    /// Config file (or defaults) with command-line overrides applied
    fn build_config(&self) -> Result<FaceDetectionConfig> {
        let mut config = match &self.config {
            Some(path) => FaceDetectionConfig::from_yaml(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => FaceDetectionConfig::default(),
        };

        let cascade = &mut config.cascade;
        if let Some(v) = self.min_size {
            cascade.min_size = v;
        }
        if let Some(v) = self.max_size {
            cascade.max_size = v;
        }
        if let Some(v) = self.shift_factor {
            cascade.shift_factor = v;
        }
        if let Some(v) = self.scale_factor {
            cascade.scale_factor = v;
        }
        if let Some(v) = self.iou_threshold {
            cascade.iou_threshold = v;
        }
        if self.circle {
            config.marker = MarkerShape::Circle;
        }

        config.validate().context("Invalid detection parameters")?;
        Ok(config)
    }

    fn write_results(&self, results: &[DetectionResult]) -> Result<()> {
        let json =
            serde_json::to_string_pretty(results).context("Failed to serialize results")?;
        match &self.output {
            Some(path) => {
                fs::write(path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Results written to {}", path.display());
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}

/// Read one input file and check it before it reaches the detector
fn load_input(path: &Path, max_bytes: u64) -> Result<(String, Vec<u8>), FaceDetectionError> {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let size = fs::metadata(path).map_err(ProcessingError::from)?.len();
    if size > max_bytes {
        return Err(ProcessingError::FileTooLarge {
            name,
            size,
            max: max_bytes,
        }
        .into());
    }

    let bytes = fs::read(path).map_err(ProcessingError::from)?;
    check_payload(&name, &bytes, max_bytes)?;
    Ok((name, bytes))
}

fn annotated_path(dir: &Path, image_name: &str) -> PathBuf {
    dir.join(Path::new(image_name).with_extension("jpg"))
}

fn write_annotated(dir: &Path, results: &[DetectionResult]) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    for result in results {
        let path = annotated_path(dir, &result.image_name);
        fs::write(&path, &result.image)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    info!("Annotated images written to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        cmd: DetectCommand,
    }

    fn parse(args: &[&str]) -> DetectCommand {
        let mut argv = vec!["facefind"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).cmd
    }

    #[test]
    fn test_flags_override_defaults() {
        let cmd = parse(&["--model", "m", "--min-size", "40", "--circle", "a.jpg"]);
        let config = cmd.build_config().unwrap();
        assert_eq!(config.cascade.min_size, 40);
        assert_eq!(config.cascade.max_size, 2000);
        assert_eq!(config.marker, MarkerShape::Circle);
        assert_eq!(cmd.max_file_size_mb, 32);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.yaml");
        fs::write(&path, "cascade:\n  min_size: 30\n  iou_threshold: 0.4\n").unwrap();

        let config_arg = path.to_str().unwrap();
        let cmd = parse(&["-m", "m", "-c", config_arg, "--iou-threshold", "0.25", "a.jpg"]);
        let config = cmd.build_config().unwrap();
        assert_eq!(config.cascade.min_size, 30);
        assert_eq!(config.cascade.iou_threshold, 0.25);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let cmd = parse(&["-m", "m", "--min-size", "500", "--max-size", "100", "a.jpg"]);
        assert!(cmd.build_config().is_err());
    }

    #[test]
    fn test_load_input_rejections() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("empty.jpg");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(
            load_input(&empty, 1024),
            Err(FaceDetectionError::Rejected(ProcessingError::EmptyInput(_)))
        ));

        let text = dir.path().join("notes.jpg");
        fs::write(&text, b"just some text").unwrap();
        assert!(matches!(
            load_input(&text, 1024),
            Err(FaceDetectionError::Rejected(ProcessingError::UnsupportedFormat { .. }))
        ));

        let big = dir.path().join("big.png");
        fs::write(&big, vec![0u8; 2048]).unwrap();
        assert!(matches!(
            load_input(&big, 1024),
            Err(FaceDetectionError::Rejected(ProcessingError::FileTooLarge { size: 2048, .. }))
        ));

        assert!(matches!(
            load_input(&dir.path().join("missing.jpg"), 1024),
            Err(FaceDetectionError::Rejected(ProcessingError::Io(_)))
        ));
    }

    #[test]
    fn test_load_input_accepts_png_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        fs::write(&path, b"\x89PNG\r\n\x1a\n0000").unwrap();
        let (name, bytes) = load_input(&path, 1024).unwrap();
        assert_eq!(name, "tiny.png");
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn test_annotated_path_uses_jpg_extension() {
        let dir = Path::new("/tmp/out");
        assert_eq!(annotated_path(dir, "group.png"), dir.join("group.jpg"));
        assert_eq!(annotated_path(dir, "selfie.jpg"), dir.join("selfie.jpg"));
    }
}
