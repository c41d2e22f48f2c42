use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use songreel::{
    BatchConfig, CancelToken, ContainerFormat, EncodingPolicy, ExecutorConfig, ImageOrder,
    ProcessRunner, ResolutionPreset, SongreelError, SongreelResult, create_videos,
    discover_media, ensure_ffmpeg, plan_batch,
    policy::{AUDIO_EXTENSIONS, IMAGE_EXTENSIONS},
    prompt::{MAX_PROMPT_ATTEMPTS, ensure_output_dir, prompt_yes_no},
};
use tracing_subscriber::EnvFilter;

/// Batch-create still-image music videos with ffmpeg.
#[derive(Parser, Debug)]
#[command(name = "songreel", version)]
struct Cli {
    /// Audio file, or folder of audio files.
    #[arg(short, long, required_unless_present = "formats")]
    audio: Option<PathBuf>,

    /// Image file, or folder of images.
    #[arg(short, long, required_unless_present = "formats")]
    image: Option<PathBuf>,

    /// Folder the videos are written to.
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Output container (default: webm).
    #[arg(long, value_enum)]
    vid_format: Option<ContainerFormat>,

    /// Encode with libx265 instead of libx264 (ignored for webm).
    #[arg(short = 'x', long)]
    use_x265: bool,

    /// Also search subfolders of the audio and image paths.
    #[arg(short, long)]
    recursive: bool,

    /// Pick a random image per song instead of cycling through them.
    #[arg(long, visible_alias = "rng")]
    random_image_order: bool,

    /// Seed for --random-image-order.
    #[arg(long)]
    seed: Option<u64>,

    /// Scale and pad every video to this size.
    #[arg(long, value_enum)]
    resolution: Option<ResolutionPreset>,

    /// JSON file with batch defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up on a parallel batch after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Run one ffmpeg at a time.
    #[arg(long)]
    sequential: bool,

    /// Print the planned ffmpeg commands as JSON and exit.
    #[arg(long)]
    dry_run: bool,

    /// Create a missing output folder without asking.
    #[arg(short = 'y', long)]
    yes: bool,

    /// Log debug output.
    #[arg(short, long)]
    verbose: bool,

    /// List the supported file formats and exit.
    #[arg(short, long)]
    formats: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_abort() => {
            tracing::warn!("Aborted by user");
            ExitCode::from(err.exit_code())
        }
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> SongreelResult<()> {
    if cli.formats {
        println!("Valid image formats: {}", IMAGE_EXTENSIONS.join(", "));
        println!("Valid audio formats: {}", AUDIO_EXTENSIONS.join(", "));
        let video = ContainerFormat::ALL.map(|f| f.extension());
        println!("Valid video formats: {}", video.join(", "));
        return Ok(());
    }

    let file_cfg = match &cli.config {
        Some(path) => BatchConfig::load(path)?,
        None => BatchConfig::default(),
    };
    let settings = Settings::merge(&cli, &file_cfg);

    let (Some(audio), Some(image)) = (&cli.audio, &cli.image) else {
        return Err(SongreelError::configuration(
            "both --audio and --image are required",
        ));
    };
    let audio = absolute(audio)?;
    let image = absolute(image)?;
    let out_dir = absolute(&cli.output)?;

    let mut stdin = std::io::stdin().lock();
    let mut policy =
        EncodingPolicy::from_preset(settings.vid_format, settings.use_x265, settings.resolution);
    if !cli.dry_run {
        let location = ensure_ffmpeg(&mut stdin)?;
        policy = policy.with_program(location.program());
    }

    let audio_files = discover_media(&audio, AUDIO_EXTENSIONS, settings.recursive)?;
    let image_files = discover_media(&image, IMAGE_EXTENSIONS, settings.recursive)?;

    let plan = plan_batch(
        &audio_files,
        &image_files,
        settings.order,
        &out_dir,
        &policy,
    )?;

    if cli.dry_run {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", plan.to_json()?).context("failed to write plan")?;
        return Ok(());
    }

    ensure_output_dir(&out_dir, |dir| {
        cli.yes
            || prompt_yes_no(
                &format!(
                    "The output folder '{}' doesn't exist. Create it? [Y/n]",
                    dir.display()
                ),
                true,
                &mut stdin,
                MAX_PROMPT_ATTEMPTS,
            )
    })?;
    drop(stdin);

    let cancel = CancelToken::new();
    cancel.install_ctrlc_handler()?;

    let mut exec_cfg = ExecutorConfig::detect();
    exec_cfg.force_sequential = settings.sequential;
    if let Some(secs) = settings.timeout_secs {
        exec_cfg.wait_timeout = Duration::from_secs(secs);
    }

    create_videos(&plan, &ProcessRunner::default(), &exec_cfg, &cancel)?;
    Ok(())
}

/// CLI flags layered over the config file.
struct Settings {
    vid_format: ContainerFormat,
    use_x265: bool,
    resolution: Option<ResolutionPreset>,
    order: ImageOrder,
    recursive: bool,
    timeout_secs: Option<u64>,
    sequential: bool,
}

impl Settings {
    fn merge(cli: &Cli, cfg: &BatchConfig) -> Self {
        let random = cli.random_image_order || cfg.random_image_order.unwrap_or(false);
        let order = if random {
            ImageOrder::Random {
                seed: cli.seed.or(cfg.seed),
            }
        } else {
            ImageOrder::Sequential
        };
        Self {
            vid_format: cli.vid_format.or(cfg.vid_format).unwrap_or_default(),
            use_x265: cli.use_x265 || cfg.use_x265.unwrap_or(false),
            resolution: cli.resolution.or(cfg.resolution),
            order,
            recursive: cli.recursive || cfg.recursive.unwrap_or(false),
            timeout_secs: cli.timeout_secs.or(cfg.timeout_secs),
            sequential: cli.sequential || cfg.sequential.unwrap_or(false),
        }
    }
}

fn absolute(path: &Path) -> SongreelResult<PathBuf> {
    let abs = std::path::absolute(path)
        .with_context(|| format!("failed to resolve '{}'", path.display()))?;
    Ok(abs)
}
