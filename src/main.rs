use std::path::PathBuf;

use clap::{Parser, Subcommand};

use prompt_motion::config::Config;
use prompt_motion::error::PipelineError;
use prompt_motion::pipeline::Session;
use prompt_motion::prompt::{self, SessionCommand};
use prompt_motion::replicate::{
    validate_dimension, GenerationRequest, PreviewFile, ReplicateClient, ARTIFACT_FILE_NAME,
    ARTIFACT_MEDIA_TYPE, DIMENSION_STEP, MAX_DIMENSION, MIN_DIMENSION, REPLICATE_TOKEN_ENV,
};

/// Parse and validate an image dimension (multiple of 128 in 384-1024).
fn parse_dimension(s: &str) -> Result<u32, String> {
    let value: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid dimension", s))?;
    validate_dimension(value).map_err(|_| {
        format!(
            "Dimension must be a multiple of {} between {} and {}, got {}",
            DIMENSION_STEP, MIN_DIMENSION, MAX_DIMENSION, value
        )
    })?;
    Ok(value)
}

/// prompt-motion: animated clips from text prompts
#[derive(Parser)]
#[command(name = "prompt-motion")]
#[command(version, about = "Animated clips from text prompts")]
#[command(long_about = "Generate a first-frame image from a text prompt, animate it \
    with a hosted video model, and save the resulting clip. Runs one-shot or as an \
    interactive session.")]
#[command(after_help = "EXAMPLES:
    # One-shot: prompt in, animation.mp4 out
    prompt-motion generate \"a cat on a skateboard, cartoon style\"

    # Custom frame size and output path
    prompt-motion generate \"northern lights over a fjord\" -W 1024 -H 512 -o fjord.mp4

    # Interactive session (regenerate frames, then animate)
    prompt-motion session

    # Check that the API token works
    prompt-motion verify-key

ENVIRONMENT:
    REPLICATE_API_TOKEN    Required. Your Replicate API token (a .env file works too).")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image and animate it in one run
    #[command(after_help = "EXAMPLES:
    prompt-motion generate \"a cat on a skateboard, cartoon style\"
    prompt-motion generate \"a paper boat in a puddle\" -W 512 -H 512
    prompt-motion generate \"city in the rain\" --frames 49 --fps 25 -o rain.mp4
    prompt-motion generate \"moth around a lamp\" --url-only

ENVIRONMENT:
    REPLICATE_API_TOKEN    Required. Your Replicate API token.")]
    Generate {
        /// The text prompt describing the scene to animate
        prompt: String,

        /// First-frame width in pixels (multiple of 128, 384-1024)
        #[arg(long, short = 'W', value_parser = parse_dimension)]
        width: Option<u32>,

        /// First-frame height in pixels (multiple of 128, 384-1024)
        #[arg(long, short = 'H', value_parser = parse_dimension)]
        height: Option<u32>,

        /// Output path for the saved clip (default: animation.mp4)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Print the result URLs without downloading the clip
        #[arg(long)]
        url_only: bool,

        /// Frame count passed to the video model unchanged
        #[arg(long)]
        frames: Option<u32>,

        /// Frame rate passed to the video model unchanged
        #[arg(long)]
        fps: Option<u32>,

        /// Path to a custom config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Start an interactive session
    ///
    /// Type a prompt to generate a first frame, then /video to animate it.
    /// Type /help inside the session for the full command list.
    Session {
        /// Path to a custom config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Check the API token against the provider
    VerifyKey,
}

fn main() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            prompt,
            width,
            height,
            output,
            url_only,
            frames,
            fps,
            config,
        } => run_generate(
            &prompt,
            width,
            height,
            output,
            url_only,
            frames,
            fps,
            config.as_deref(),
        ),
        Commands::Session { config } => run_session(config.as_deref()),
        Commands::VerifyKey => run_verify_key(),
    };

    if let Err(message) = result {
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }
}

/// Read the API token from the environment, with setup help when missing.
fn require_token() -> Result<String, String> {
    std::env::var(REPLICATE_TOKEN_ENV).map_err(|_| {
        format!(
            "{} environment variable is not set.\n\n\
            Add your API token to a .env file:\n    \
            echo '{}=your-token-here' >> .env\n\n\
            Or set it as an environment variable:\n    \
            export {}=\"your-token-here\"\n\n\
            Get a token at: https://replicate.com/account",
            REPLICATE_TOKEN_ENV, REPLICATE_TOKEN_ENV, REPLICATE_TOKEN_ENV
        )
    })
}

/// Remove leftover preview files and arrange Ctrl+C cleanup for this run's.
fn init_preview_cleanup() {
    match PreviewFile::purge_stale() {
        Ok(0) => {}
        Ok(count) => log::info!("purged {} stale preview file(s)", count),
        Err(e) => log::warn!("could not purge stale preview files: {}", e),
    }

    let preview_path = PreviewFile::process_path();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = std::fs::remove_file(&preview_path);
        std::process::exit(130);
    }) {
        log::warn!("could not install Ctrl+C handler: {}", e);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_generate(
    prompt: &str,
    width: Option<u32>,
    height: Option<u32>,
    output: Option<PathBuf>,
    url_only: bool,
    frames: Option<u32>,
    fps: Option<u32>,
    config_path: Option<&std::path::Path>,
) -> Result<(), String> {
    let config = Config::load(config_path).map_err(|e| e.to_string())?;
    let token = require_token()?;

    init_preview_cleanup();

    let width = width.unwrap_or(config.generation.width);
    let height = height.unwrap_or(config.generation.height);
    let request = GenerationRequest::new(prompt, width, height);

    let mut session = Session::from_config(&config)
        .map_err(|e| format!("Failed to initialize session: {}", e))?;
    let mut tunables = config.video.tunables();
    if frames.is_some() {
        tunables.num_frames = frames;
    }
    if fps.is_some() {
        tunables.fps = fps;
    }
    session.set_tunables(tunables);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to create async runtime: {}", e))?;

    rt.block_on(async {
        print!("Checking API token... ");
        flush_stdout();
        let valid = session
            .set_credential(&token)
            .await
            .map_err(|e| format!("Token check failed: {}", e))?;
        if !valid {
            return Err("the provider rejected the API token. \
                Check REPLICATE_API_TOKEN and try again."
                .to_string());
        }
        println!("ok");

        println!("Generating first frame ({}x{}) for: \"{}\"", width, height, prompt);
        print!("This can take a minute... ");
        flush_stdout();
        let image = session
            .generate_image(&request)
            .await
            .map_err(describe_error)?;
        println!("done");
        println!("  Image URL: {}", image.url);

        println!("Animating the frame...");
        print!("This can take a few minutes... ");
        flush_stdout();
        let video = session.generate_video(prompt).await.map_err(describe_error)?;
        println!("done");
        println!("  Video URL: {}", video.url);

        if url_only {
            println!();
            println!("Skipping download (--url-only).");
            return Ok(());
        }

        let dest = output.unwrap_or_else(|| PathBuf::from(ARTIFACT_FILE_NAME));
        print!("Downloading clip... ");
        flush_stdout();
        let saved = session.save_video(&dest).await.map_err(describe_error)?;
        println!("done");

        println!();
        println!("Clip ready!");
        println!("  Path: {} ({})", saved.display(), ARTIFACT_MEDIA_TYPE);
        Ok(())
    })
}

fn run_session(config_path: Option<&std::path::Path>) -> Result<(), String> {
    use std::io::BufRead;

    let config = Config::load(config_path).map_err(|e| e.to_string())?;

    init_preview_cleanup();

    let mut session = Session::from_config(&config)
        .map_err(|e| format!("Failed to initialize session: {}", e))?;
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to create async runtime: {}", e))?;

    // Width/height come from config in session mode; the CLI one-shot handles
    // per-run overrides.
    let width = config.generation.width;
    let height = config.generation.height;

    // Pick up the token from the environment when present; /key can replace it.
    if let Ok(token) = std::env::var(REPLICATE_TOKEN_ENV) {
        match rt.block_on(session.set_credential(&token)) {
            Ok(true) => println!("API token ok."),
            Ok(false) => println!("Warning: the provider rejected the API token from the environment."),
            Err(e) => println!("Warning: token check failed: {}", e),
        }
    } else {
        println!(
            "No {} set. Use /key <token> to supply one.",
            REPLICATE_TOKEN_ENV
        );
    }

    println!("Interactive session. Type a prompt to generate a first frame; /help for commands.");

    // The prompt used for the last image doubles as the video prompt unless
    // /video overrides it.
    let mut last_prompt: Option<String> = None;

    let stdin = std::io::stdin();
    prompt::print_prompt();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break, // EOF or read error
        };

        let Some(command) = prompt::parse_input(&line) else {
            prompt::print_prompt();
            continue;
        };

        match command {
            SessionCommand::Quit => break,
            SessionCommand::Help => prompt::print_help(),
            SessionCommand::Status => {
                println!("State: {}", session.state().name());
                match session.state().image_url() {
                    Some(url) => println!("  Image: {}", url),
                    None => println!("  Image: (none)"),
                }
                match session.state().video_url() {
                    Some(url) => println!("  Video: {}", url),
                    None => println!("  Video: (none)"),
                }
            }
            SessionCommand::Reset => {
                session.reset();
                println!("Session cleared.");
            }
            SessionCommand::SetKey(token) => match rt.block_on(session.set_credential(&token)) {
                Ok(true) => println!("API token ok."),
                Ok(false) => println!("The provider rejected that token."),
                Err(e) => println!("Token check failed: {}", e),
            },
            SessionCommand::ShowUrl => match session.state().video_url() {
                Some(url) => println!("{}", url),
                None => println!("No video yet. Generate one with /video."),
            },
            SessionCommand::Image(text) => {
                println!("Generating first frame ({}x{})...", width, height);
                let request = GenerationRequest::new(&text, width, height);
                match rt.block_on(session.generate_image(&request)) {
                    Ok(image) => {
                        println!("Image ready: {}", image.url);
                        println!("Animate it with /video.");
                        last_prompt = Some(text);
                    }
                    Err(e) => println!("{}", describe_error(e)),
                }
            }
            SessionCommand::Video(override_prompt) => {
                let Some(text) = override_prompt.or_else(|| last_prompt.clone()) else {
                    println!("No prompt yet. Generate an image first, or use /video <prompt>.");
                    prompt::print_prompt();
                    continue;
                };
                println!("Animating the frame (this can take a few minutes)...");
                match rt.block_on(session.generate_video(&text)) {
                    Ok(video) => {
                        println!("Video ready: {}", video.url);
                        println!("Save it with /save, or /url to copy the link.");
                        last_prompt = Some(text);
                    }
                    Err(e) => println!("{}", describe_error(e)),
                }
            }
            SessionCommand::Save(path) => {
                let dest = path.unwrap_or_else(|| PathBuf::from(ARTIFACT_FILE_NAME));
                match rt.block_on(session.save_video(&dest)) {
                    Ok(saved) => println!("Saved {} ({})", saved.display(), ARTIFACT_MEDIA_TYPE),
                    Err(e) => println!("{}", describe_error(e)),
                }
            }
        }

        prompt::print_prompt();
    }

    println!("Bye.");
    Ok(())
}

fn run_verify_key() -> Result<(), String> {
    let token = require_token()?;

    let client = ReplicateClient::with_token(token)
        .map_err(|e| format!("Failed to create client: {}", e))?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to create async runtime: {}", e))?;

    let valid = rt
        .block_on(client.verify_token())
        .map_err(|e| format!("Token check failed: {}", e))?;

    if valid {
        println!("API token ok.");
        Ok(())
    } else {
        Err("the provider rejected the API token.".to_string())
    }
}

/// Render a pipeline error as a user-facing message.
fn describe_error(error: PipelineError) -> String {
    match error {
        PipelineError::NotConfigured => {
            "No API token configured. Set REPLICATE_API_TOKEN or use /key <token>.".to_string()
        }
        PipelineError::Validation(reason) => format!("Cannot do that: {}", reason),
        PipelineError::Upstream(message) => format!("The provider call failed: {}", message),
        PipelineError::GenerationFailed(message) => format!("Generation failed: {}", message),
        PipelineError::InvalidUpstreamResult(detail) => {
            format!("The provider returned an unusable result: {}", detail)
        }
        PipelineError::DownloadFailed(status) => {
            format!("Download failed with HTTP status {}.", status)
        }
        PipelineError::Io(e) => format!("File error: {}", e),
    }
}

fn flush_stdout() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
