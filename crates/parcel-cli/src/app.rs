use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "parcel", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(subcommand)]
    pub cmd: Commands,

    /// Configuration file (defaults to $PARCEL_CONFIG, then built-in defaults)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Download, verify and decrypt the attachment described by a pointer file
    #[command(alias = "f", name = "fetch")]
    Fetch(FetchArgs),
    /// Encrypt a local file and write its ciphertext and pointer
    #[command(alias = "s", name = "seal")]
    Seal(SealArgs),
}

#[derive(Clone, Debug, Args)]
pub struct FetchArgs {
    /// Pointer JSON as written by `parcel seal`
    #[arg(value_name = "POINTER")]
    pub pointer: PathBuf,

    /// Store the decrypted artifact here instead of the configured directory
    #[arg(short, long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Override the configured CDN base URL
    #[arg(long, env = "PARCEL_CDN", value_name = "URL")]
    pub cdn: Option<String>,

    /// Do not draw a progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Clone, Debug, Args)]
pub struct SealArgs {
    /// Plaintext file to encrypt
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Where to write the ciphertext blob
    #[arg(short, long, value_name = "FILE")]
    pub out: PathBuf,

    /// Server-side key the blob will be uploaded under
    #[arg(short, long, default_value = "0")]
    pub remote_key: String,

    /// Attachment id (defaults to the input file name)
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub content_type: Option<String>,

    /// Write the pointer JSON here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub pointer: Option<PathBuf>,

    /// Skip bucket padding and encrypt the exact plaintext length
    #[arg(long)]
    pub no_padding: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_well_formed() { App::command().debug_assert(); }

    #[test]
    fn test_parse_fetch_with_global_flags() {
        let app = App::try_parse_from(["parcel", "-vv", "fetch", "p.json", "--out-dir", "out", "-c", "parcel.toml"]).unwrap();
        assert_eq!(app.verbose, 2);
        assert_eq!(app.config, Some(PathBuf::from("parcel.toml")));
        match app.cmd {
            Commands::Fetch(args) => {
                assert_eq!(args.pointer, PathBuf::from("p.json"));
                assert_eq!(args.out_dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_seal_requires_out() {
        assert!(App::try_parse_from(["parcel", "seal", "photo.jpg"]).is_err());
    }
}
