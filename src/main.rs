use clap::{Parser, Subcommand};
use pixelcrypt::cli::{
    decode_file, encode_file, show_capacity, show_status, write_keypair, DecodeOptions,
    EncodeOptions, KeygenOptions,
};
use pixelcrypt::telemetry::init_logging;
use pixelcrypt::{CarrierKind, Config, PixelCryptError, Vault};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use zeroize::Zeroizing;

/// Version info from build.rs
const VERSION: &str = env!("PIXELCRYPT_VERSION");
const PROFILE: &str = env!("PIXELCRYPT_PROFILE");
const GIT_HASH: &str = env!("PIXELCRYPT_GIT_HASH");
const TARGET: &str = env!("PIXELCRYPT_TARGET");

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} ({} {}, {})", VERSION, GIT_HASH, PROFILE, TARGET))
}

#[derive(Parser)]
#[command(name = "pixelcrypt")]
#[command(author, about = "Hide RSA-sealed secrets in images, audio and video", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    /// JSON configuration file
    #[arg(long, global = true, env = "PIXELCRYPT_CONFIG")]
    config: Option<PathBuf>,

    /// Quarantine registry database
    #[arg(long, global = true, env = "PIXELCRYPT_REGISTRY")]
    registry: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, global = true, env = "PIXELCRYPT_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// ffprobe executable
    #[arg(long, global = true, env = "PIXELCRYPT_FFPROBE")]
    ffprobe: Option<PathBuf>,

    /// Directory for temporary video files
    #[arg(long, global = true, env = "PIXELCRYPT_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PIXELCRYPT_LOG")]
    log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long, global = true, env = "PIXELCRYPT_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an RSA-2048 keypair
    #[command(alias = "k")]
    Keygen {
        /// Directory for private_key.pem and public_key.pem
        #[arg(default_value = ".")]
        out_dir: PathBuf,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Show how many bytes a carrier can hold
    #[command(alias = "c")]
    Capacity {
        input: PathBuf,

        /// Carrier kind (image, audio, video); detected from the extension by default
        #[arg(long, value_parser = parse_kind)]
        kind: Option<CarrierKind>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Seal a secret for a public key and hide it in a carrier
    #[command(alias = "e")]
    Encode {
        /// Carrier file
        input: PathBuf,

        /// Recipient public key (PEM)
        #[arg(long)]
        public_key: PathBuf,

        /// Secret text
        #[arg(long, required_unless_present = "secret_file", conflicts_with = "secret_file")]
        secret: Option<String>,

        /// Read the secret from a file
        #[arg(long)]
        secret_file: Option<PathBuf>,

        /// Output file (default: <stem>_encoded.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_parser = parse_kind)]
        kind: Option<CarrierKind>,
    },

    /// Recover a hidden secret with a private key
    #[command(alias = "d")]
    Decode {
        /// Encoded carrier file
        input: PathBuf,

        /// Private key (PEM)
        #[arg(long)]
        private_key: PathBuf,

        /// Write the secret to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_parser = parse_kind)]
        kind: Option<CarrierKind>,
    },

    /// Show the quarantine state of a carrier
    #[command(alias = "s")]
    Status {
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_kind(s: &str) -> Result<CarrierKind, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn load_config(cli: &Cli) -> pixelcrypt::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(registry) = &cli.registry {
        config.registry_path = registry.clone();
    }
    if let Some(ffmpeg) = &cli.ffmpeg {
        config.ffmpeg = ffmpeg.clone();
    }
    if let Some(ffprobe) = &cli.ffprobe {
        config.ffprobe = ffprobe.clone();
    }
    if let Some(work_dir) = &cli.work_dir {
        config.work_dir = Some(work_dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.log_json |= cli.log_json;
    config.validate()?;
    Ok(config)
}

fn run(command: Commands, config: &Config) -> pixelcrypt::Result<()> {
    match command {
        Commands::Keygen { out_dir, force } => {
            let files = write_keypair(&out_dir, &KeygenOptions { force })?;
            println!("Private key: {}", files.private_key.display());
            println!("Public key:  {}", files.public_key.display());
            Ok(())
        }

        Commands::Capacity { input, kind, json } => {
            let vault = Vault::from_config(config)?;
            let report = show_capacity(&vault, &input, kind)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
            Ok(())
        }

        Commands::Encode {
            input,
            public_key,
            secret,
            secret_file,
            output,
            kind,
        } => {
            let secret = match (secret, secret_file) {
                (Some(text), _) => Zeroizing::new(text.into_bytes()),
                (None, Some(path)) => Zeroizing::new(std::fs::read(path)?),
                (None, None) => return Err(PixelCryptError::SecretRequired),
            };
            let options = EncodeOptions {
                public_key,
                secret,
                kind,
                output,
            };
            let vault = Vault::from_config(config)?;
            let written = encode_file(&vault, &input, &options)?;
            println!("Encoded to {}", written.display());
            Ok(())
        }

        Commands::Decode {
            input,
            private_key,
            output,
            kind,
        } => {
            let vault = Vault::from_config(config)?;
            let secret = decode_file(&vault, &input, &DecodeOptions { private_key, kind })?;
            match output {
                Some(path) => {
                    std::fs::write(&path, secret.as_slice())?;
                    println!("Secret written to {}", path.display());
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&secret)?;
                    stdout.write_all(b"\n")?;
                }
            }
            Ok(())
        }

        Commands::Status { input, json } => {
            let vault = Vault::from_config(config)?;
            let report = show_status(&vault, &input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("pixelcrypt {}", get_version());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.log_level, config.log_json) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            if let Err(e) = Cli::command().print_help() {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
            println!();
            return ExitCode::SUCCESS;
        }
    };

    match run(command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
