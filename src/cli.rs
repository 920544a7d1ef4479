//! Command-line surface: `gyz <paths>...` and `gyz upload <paths>...` take
//! the same arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::option::FlagValues;
use crate::upload::DEFAULT_PARALLEL;

#[derive(Parser, Debug)]
#[command(name = "gyz", version, about = "Upload images and directories of images to Gyazo")]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
pub struct Cli {
    /// Do not log messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub upload: UploadArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload files and directories (same as running without a subcommand)
    Upload(UploadArgs),
}

impl Cli {
    /// The upload arguments, whichever form was used.
    pub fn into_upload_args(self) -> UploadArgs {
        match self.command {
            Some(Command::Upload(args)) => args,
            None => self.upload,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Image files or directories to upload
    #[arg(required = true, value_name = "FILE|DIR")]
    pub paths: Vec<PathBuf>,

    /// Number of parallel uploads
    #[arg(short, long, default_value_t = DEFAULT_PARALLEL)]
    pub parallel: usize,

    /// Ask for upload options interactively
    #[arg(short, long)]
    pub interactive: bool,

    /// Description
    #[arg(long, default_value = "")]
    pub desc: String,

    /// Name of the application the image came from
    #[arg(long, default_value = "")]
    pub app: String,

    /// Who can see the image: anyone or only_me
    #[arg(long, default_value = "")]
    pub access_policy: String,

    /// Publish URL, title and description
    #[arg(long)]
    pub metadata_is_public: bool,

    /// Use EXIF capture time and camera settings
    #[arg(long)]
    pub exif: bool,

    /// Title
    #[arg(long, default_value = "")]
    pub title: String,

    /// URL of the page the image came from
    #[arg(long, default_value = "")]
    pub referer_url: String,

    /// Collection to add the image to
    #[arg(long, default_value = "")]
    pub collection_id: String,

    /// Capture time (RFC 3339), overridden by EXIF when --exif is set
    #[arg(long, default_value = "")]
    pub created_at: String,
}

impl UploadArgs {
    pub fn flag_values(&self) -> FlagValues {
        FlagValues {
            access_policy: self.access_policy.clone(),
            metadata_is_public: self.metadata_is_public,
            exif: self.exif,
            referer_url: self.referer_url.clone(),
            app: self.app.clone(),
            title: self.title.clone(),
            desc: self.desc.clone(),
            created_at: self.created_at.clone(),
            collection_id: self.collection_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_uploads() {
        let cli = Cli::try_parse_from(["gyz", "-p", "2", "--exif", "a.png", "dir"]).unwrap();
        let args = cli.into_upload_args();
        assert_eq!(args.paths, vec![PathBuf::from("a.png"), PathBuf::from("dir")]);
        assert_eq!(args.parallel, 2);
        assert!(args.exif);
    }

    #[test]
    fn upload_subcommand_takes_the_same_flags() {
        let cli = Cli::try_parse_from([
            "gyz",
            "upload",
            "-q",
            "--desc",
            "hello",
            "--access-policy",
            "only_me",
            "a.png",
        ])
        .unwrap();
        assert!(cli.quiet);
        let args = cli.into_upload_args();
        assert_eq!(args.parallel, DEFAULT_PARALLEL);
        let flags = args.flag_values();
        assert_eq!(flags.desc, "hello");
        assert_eq!(flags.access_policy, "only_me");
    }

    #[test]
    fn paths_are_required() {
        assert!(Cli::try_parse_from(["gyz"]).is_err());
        assert!(Cli::try_parse_from(["gyz", "upload"]).is_err());
    }
}
