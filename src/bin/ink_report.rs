use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use candle_core::Tensor;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use image::{GrayImage, Luma};
use indicatif::{ProgressBar, ProgressStyle};
use ink_ctc_rs::{
    estimate_char_cut_points, preprocess_raster, split_to_characters, Candidate, DecodeMethod,
    HandwritingRecognizer, InferenceBackend, InkRaster, PreprocessResult, RecognitionError,
    RecognizerBuilder, RecognizerConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodChoice {
    Greedy,
    Beam,
    #[value(name = "single-char")]
    SingleChar,
}

impl MethodChoice {
    fn decode_method(self) -> DecodeMethod {
        match self {
            Self::Greedy => DecodeMethod::Greedy,
            Self::Beam => DecodeMethod::Beam,
            Self::SingleChar => DecodeMethod::SingleChar,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ink_report")]
#[command(about = "Normalize, segment and decode handwriting rasters into a JSON report")]
struct Args {
    /// Raster images (PNG) to process.
    #[arg(required = true)]
    images: Vec<PathBuf>,
    #[arg(long, env = "INK_REPORT_CONFIG")]
    config: Option<PathBuf>,
    /// Overrides `vocab_path` from the config file.
    #[arg(long, env = "INK_REPORT_VOCAB")]
    vocab: Option<PathBuf>,
    /// Recorded model output (`{"dims": [...], "data": [...]}`) replayed for every input.
    #[arg(long, env = "INK_REPORT_LOG_PROBS")]
    log_probs: Option<PathBuf>,
    #[arg(long, env = "INK_REPORT_METHOD", value_enum)]
    method: Option<MethodChoice>,
    /// Also split each raster into characters and decode them one by one.
    #[arg(long, env = "INK_REPORT_SPLIT", default_value_t = false)]
    split: bool,
    /// Write each normalized model canvas here as a PNG.
    #[arg(long, env = "INK_REPORT_DUMP_DIR")]
    dump_dir: Option<PathBuf>,
    #[arg(long, env = "INK_REPORT_OUT")]
    out: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RecordedOutput {
    dims: Vec<usize>,
    data: Vec<f32>,
}

/// Returns the same recorded output tensor for every input.
struct ReplayBackend {
    output: RecordedOutput,
}

impl InferenceBackend for ReplayBackend {
    fn infer(&self, input: &Tensor) -> Result<Tensor, RecognitionError> {
        Tensor::from_vec(
            self.output.data.clone(),
            self.output.dims.as_slice(),
            input.device(),
        )
        .map_err(|e| RecognitionError::Runtime {
            context: "replay recorded output",
            message: e.to_string(),
        })
    }

    fn device_label(&self) -> String {
        "replay".to_string()
    }
}

#[derive(Debug, Serialize)]
struct Report {
    schema_version: u32,
    meta: Meta,
    images: Vec<ImageReport>,
}

#[derive(Debug, Serialize)]
struct Meta {
    generated_at: String,
    config_path: Option<String>,
    decode_method: String,
    backend: Option<String>,
    canvas_width: u32,
    canvas_height: u32,
    image_count: usize,
}

#[derive(Debug, Default, Serialize)]
struct ImageReport {
    path: String,
    width: u32,
    height: u32,
    valid_time_steps: Option<usize>,
    cut_points: Vec<u32>,
    segment_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Vec<Candidate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    per_character: Option<Vec<Vec<Candidate>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("ink_report: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => RecognizerConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => RecognizerConfig::default(),
    };
    if let Some(vocab) = args.vocab.as_ref() {
        config.vocab_path = vocab.to_string_lossy().into_owned();
    }
    if let Some(method) = args.method {
        config.decode_method = method.decode_method();
    }

    let recognizer = match args.log_probs.as_ref() {
        Some(path) => Some(build_recognizer(path, config.clone())?),
        None => None,
    };
    if let Some(dir) = args.dump_dir.as_ref() {
        fs::create_dir_all(dir).map_err(|err| {
            format!("Failed to create dump directory '{}': {err}", dir.display())
        })?;
    }

    let progress = ProgressBar::new(args.images.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );

    let mut images = Vec::with_capacity(args.images.len());
    for (index, path) in args.images.iter().enumerate() {
        progress.set_message(path.display().to_string());
        let raster = load_raster(path)?;
        let mut entry = ImageReport {
            path: path.to_string_lossy().into_owned(),
            width: raster.width(),
            height: raster.height(),
            cut_points: estimate_char_cut_points(&raster, &config.segmentation),
            segment_count: split_to_characters(&raster, &config.segmentation).len(),
            ..ImageReport::default()
        };

        match preprocess_raster(&raster, &config.preprocess) {
            Ok(prepared) => {
                entry.valid_time_steps = Some(prepared.valid_time_steps);
                if let Some(dir) = args.dump_dir.as_ref() {
                    dump_canvas(&prepared, &dir.join(format!("canvas-{index:04}.png")))?;
                }
            }
            Err(err) if err.is_recoverable() => entry.error = Some(err.to_string()),
            Err(err) => return Err(format!("{}: {err}", path.display())),
        }

        if let Some(recognizer) = recognizer.as_ref() {
            decode_into(recognizer, &raster, args.split, &mut entry)
                .map_err(|err| format!("{}: {err}", path.display()))?;
        }

        images.push(entry);
        progress.inc(1);
    }
    progress.finish_with_message("ink pass complete");

    let report = Report {
        schema_version: 1,
        meta: Meta {
            generated_at: Utc::now().to_rfc3339(),
            config_path: args
                .config
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned()),
            decode_method: format!("{:?}", config.decode_method),
            backend: recognizer.as_ref().map(|r| r.device_label()),
            canvas_width: config.preprocess.max_width,
            canvas_height: config.preprocess.target_height,
            image_count: images.len(),
        },
        images,
    };

    let out_path = resolve_out_path(args.out.as_ref());
    write_report(&out_path, &report)?;
    println!("{}", out_path.display());
    Ok(())
}

fn build_recognizer(
    log_probs_path: &Path,
    config: RecognizerConfig,
) -> Result<HandwritingRecognizer, String> {
    if config.vocab_path.is_empty() {
        return Err("--log-probs requires a vocabulary (--vocab or config vocab_path).".to_string());
    }
    let data = fs::read_to_string(log_probs_path).map_err(|err| {
        format!(
            "Failed to read recorded output '{}': {err}",
            log_probs_path.display()
        )
    })?;
    let output: RecordedOutput = serde_json::from_str(&data).map_err(|err| {
        format!(
            "Failed to parse recorded output '{}': {err}",
            log_probs_path.display()
        )
    })?;

    RecognizerBuilder::new(config)
        .with_backend(Box::new(ReplayBackend { output }))
        .build()
        .map_err(|err| format!("Failed to build recognizer: {err}"))
}

fn decode_into(
    recognizer: &HandwritingRecognizer,
    raster: &InkRaster,
    split: bool,
    entry: &mut ImageReport,
) -> Result<(), RecognitionError> {
    match recognizer.recognize(raster) {
        Ok(candidates) => entry.candidates = Some(candidates),
        Err(RecognitionError::EmptyInk) => return Ok(()),
        Err(err) => return Err(err),
    }
    if split {
        entry.per_character = Some(recognizer.recognize_characters(raster)?);
    }
    Ok(())
}

fn load_raster(path: &Path) -> Result<InkRaster, String> {
    let image = image::open(path)
        .map_err(|err| format!("Failed to open image '{}': {err}", path.display()))?;
    InkRaster::try_from(image).map_err(|err| format!("{}: {err}", path.display()))
}

fn dump_canvas(prepared: &PreprocessResult, path: &Path) -> Result<(), String> {
    let canvas = GrayImage::from_fn(prepared.width, prepared.height, |x, y| {
        Luma([(prepared.pixel(x, y) * 255.0).round() as u8])
    });
    canvas
        .save(path)
        .map_err(|err| format!("Failed to write canvas '{}': {err}", path.display()))
}

fn resolve_out_path(out: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = out {
        return path.clone();
    }

    let run_id = Utc::now().format("%Y%m%dT%H%M%SZ");
    PathBuf::from("target")
        .join("ink_reports")
        .join(format!("ink-report-{run_id}.json"))
}

fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create report directory '{}': {err}",
                parent.display()
            )
        })?;
    }
    let file = File::create(path)
        .map_err(|err| format!("Failed to create report '{}': {err}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .and_then(|()| writer.write_all(b"\n").map_err(serde_json::Error::io))
        .map_err(|err| format!("Failed to write report '{}': {err}", path.display()))?;
    writer
        .flush()
        .map_err(|err| format!("Failed to flush report '{}': {err}", path.display()))
}
