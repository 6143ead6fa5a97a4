// ============================================================================
// MapForge CLI — headless map derivation via command-line arguments
// ============================================================================
//
// Usage examples:
//   mapforge -i brick.jpg --convert diffuse-to-others --output-dir maps/
//   mapforge -i rock_normal.png --convert normal-to-height
//   mapforge -i *.png --convert height-to-normal --config preset.json --gpu
//   mapforge -i wall.png --convert occlusion --size 1024x1024 --verbose
//
// Each input produces `<stem>_<channel>.png` for every channel the conversion
// writes.  Without --gpu everything runs on the rayon CPU backend.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use mapforge::channel::TextureChannel;
use mapforge::config::PipelineConfig;
use mapforge::gpu::GpuBackend;
use mapforge::io::{channel_output_path, load_image_sync, save_png};
use mapforge::logger::{self, Level};
use mapforge::ops::CpuBackend;
use mapforge::passes::PassBackend;
use mapforge::pipeline::{ConversionCommand, ConversionKind, Pipeline, ResizeTarget};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Conversion {
    /// Diffuse → normal, height, occlusion, specular, roughness, metallic
    DiffuseToOthers,
    NormalToHeight,
    HeightToNormal,
    /// Height → normal → occlusion
    Occlusion,
}

impl Conversion {
    /// Channel the input image is loaded into.
    fn input_channel(self) -> TextureChannel {
        match self {
            Conversion::DiffuseToOthers => TextureChannel::Diffuse,
            Conversion::NormalToHeight => TextureChannel::Normal,
            Conversion::HeightToNormal | Conversion::Occlusion => TextureChannel::Height,
        }
    }

    /// Conversions submitted in order.
    fn steps(self) -> Vec<ConversionKind> {
        match self {
            Conversion::DiffuseToOthers => vec![ConversionKind::DiffuseToOthers],
            Conversion::NormalToHeight => vec![ConversionKind::NormalToHeight],
            Conversion::HeightToNormal => vec![ConversionKind::HeightToNormal],
            Conversion::Occlusion => vec![ConversionKind::HeightToNormal, ConversionKind::HeightNormalToOcclusion],
        }
    }

    /// Channels written to disk.
    fn outputs(self) -> Vec<TextureChannel> {
        let mut out = Vec::new();
        for kind in self.steps() {
            for ch in kind.default_targets() {
                if !out.contains(&ch) {
                    out.push(ch);
                }
            }
        }
        out
    }
}

/// MapForge headless PBR map generator.
#[derive(Parser, Debug)]
#[command(
    name = "mapforge",
    about = "Derive PBR texture maps from a single image",
    long_about = "Load a diffuse, normal or height image and derive the other\n\
                  texture channels without opening the editor. Reads PNG, JPEG,\n\
                  WebP, BMP, TGA and TIFF; writes PNG.\n\n\
                  Example:\n  \
                  mapforge -i brick.jpg --convert diffuse-to-others --output-dir maps/"
)]
pub struct CliArgs {
    /// Input image file(s). Glob patterns accepted (e.g. "*.png", "maps/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Conversion to run on each input.
    #[arg(short, long, value_enum, default_value_t = Conversion::DiffuseToOthers)]
    pub convert: Conversion,

    /// Output directory.  Defaults to each input's directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// JSON parameter preset (missing fields take their defaults).
    #[arg(long, value_name = "PRESET.json")]
    pub config: Option<PathBuf>,

    /// Resize every channel before converting.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Run passes on the GPU (falls back to the CPU when no adapter exists).
    #[arg(long)]
    pub gpu: bool,

    /// Echo the session log to stderr and print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
    if w == 0 || h == 0 {
        return Err("size must be at least 1x1".to_string());
    }
    Ok((w, h))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    logger::init();
    logger::set_echo(args.verbose);
    if args.verbose {
        logger::set_min_level(Level::Debug);
    }

    let preset = match &args.config {
        Some(path) => match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| PipelineConfig::from_json(&text))
        {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: could not load preset '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let ok = if args.gpu {
        match GpuBackend::new("") {
            Ok(gpu) => {
                if args.verbose {
                    println!("GPU: {}", gpu.adapter_name());
                }
                process_all(gpu, &inputs, &args, &preset)
            }
            Err(e) => {
                eprintln!("warning: {}; using the CPU backend", e);
                process_all(CpuBackend::new(), &inputs, &args, &preset)
            }
        }
    } else {
        process_all(CpuBackend::new(), &inputs, &args, &preset)
    };

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn process_all<B: PassBackend>(mut backend: B, inputs: &[PathBuf], args: &CliArgs, preset: &PipelineConfig) -> bool {
    let total = inputs.len();
    let multi = total > 1;
    let mut all_ok = true;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let mut pipeline = match Pipeline::new(backend) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("  error: {}", e);
                return false;
            }
        };
        let mut cfg = preset.clone();
        match run_one(&mut pipeline, &mut cfg, input_path, args) {
            Ok(written) => {
                if args.verbose || multi {
                    for path in &written {
                        println!("  → {}", path.display());
                    }
                    println!("  ({:.0}ms)", file_start.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                all_ok = false;
            }
        }
        backend = pipeline.into_backend();
    }

    all_ok
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one<B: PassBackend>(
    pipeline: &mut Pipeline<B>,
    cfg: &mut PipelineConfig,
    input: &Path,
    args: &CliArgs,
) -> Result<Vec<PathBuf>, String> {
    // -- Step 1: Load ----------------------------------------------------
    let img = load_image_sync(input).map_err(|e| format!("load failed: {}", e))?;
    let host = args.convert.input_channel();
    pipeline.load_image(host, &img).map_err(|e| e.to_string())?;
    pipeline.render_channel(host, cfg).map_err(|e| e.to_string())?;

    // -- Step 2: Resize (optional) ---------------------------------------
    if let Some((width, height)) = args.size {
        pipeline.submit(ConversionCommand::new(ConversionKind::Resize(ResizeTarget::Exact {
            width,
            height,
        })));
        pipeline.render_channel(host, cfg).map_err(|e| e.to_string())?;
    }

    // -- Step 3: Convert, then refresh whatever went stale ---------------
    for kind in args.convert.steps() {
        let Some(runs_on) = kind.host_channel() else {
            continue;
        };
        pipeline.submit(ConversionCommand::new(kind));
        let report = pipeline.render_channel(runs_on, cfg).map_err(|e| e.to_string())?;
        for ch in report.stale {
            pipeline.render_channel(ch, cfg).map_err(|e| e.to_string())?;
        }
    }

    // -- Step 4: Save ----------------------------------------------------
    let mut written = Vec::new();
    for ch in args.convert.outputs() {
        let path = channel_output_path(input, args.output_dir.as_deref(), ch)
            .ok_or_else(|| format!("cannot determine output path for '{}'", input.display()))?;
        let out = pipeline.read_channel(ch).map_err(|e| e.to_string())?;
        save_png(&out, &path).map_err(|e| format!("save failed: {}", e))?;
        written.push(path);
    }
    Ok(written)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => eprintln!("warning: invalid glob '{}': {}", pattern, e),
        }
    }

    result
}
