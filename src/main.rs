#![deny(elided_lifetimes_in_paths)]
#![deny(explicit_outlives_requirements)]
#![deny(keyword_idents)]
#![deny(meta_variable_misuse)]
#![deny(missing_debug_implementations)]
#![deny(non_ascii_idents)]
#![warn(noop_method_call)]
#![deny(single_use_lifetimes)]
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![deny(unsafe_code)]
#![warn(unused_crate_dependencies)]
#![deny(unused_import_braces)]
#![deny(unused_lifetimes)]
#![warn(unused_macro_rules)]

pub mod apktool;
pub mod bytecode;
pub mod error;
pub mod logging;
pub mod repair;
pub mod resource;
pub mod scanner;

use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::bytecode::BytecodePatch;
use crate::repair::{repair, RepairConfig, RepairStatus};
use crate::resource::Family;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the apktool command or apktool.jar package
    #[arg(short, long)]
    apktool_path: Option<String>,

    /// Log more details, repeat for even more. Ignored if RUST_LOG is set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ArgsCommand,
}

#[derive(Subcommand, Debug)]
enum ArgsCommand {
    /// Repair a package directory previously unpacked by apktool, in place
    Repair {
        package_dir: PathBuf,

        #[command(flatten)]
        options: RepairArgs,
    },
    /// Unpack APK with apktool, then repair the result
    Unpack {
        apk_path: PathBuf,

        /// Directory to unpack into, defaults to the APK path without extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: RepairArgs,
    },
}

#[derive(clap::Args, Debug)]
struct RepairArgs {
    /// Resource type whose dangling declarations should be commented out, can be repeated
    #[arg(long = "family", default_value = "anim", value_parser = parse_family)]
    families: Vec<Family>,

    /// Directory containing the smali file to patch, relative to the package directory
    #[arg(long, default_value = bytecode::SMALI_DIRECTORY)]
    smali_dir: String,

    /// File name of the smali file to patch
    #[arg(long, default_value = bytecode::TARGET_FILE)]
    target_file: String,

    /// Signature line of the method to replace
    #[arg(long, default_value = bytecode::TARGET_SIGNATURE, value_parser = NonEmptyStringValueParser::new())]
    signature: String,

    /// Leave smali code alone
    #[arg(long)]
    skip_bytecode: bool,
}

impl From<RepairArgs> for RepairConfig {
    fn from(args: RepairArgs) -> Self {
        Self {
            families: args.families,
            bytecode: (!args.skip_bytecode).then(|| BytecodePatch {
                directory: args.smali_dir,
                file_name: args.target_file,
                signature: args.signature,
            }),
        }
    }
}

fn parse_family(value: &str) -> Result<Family, String> {
    Family::try_from(value).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    let (package_dir, config) = match args.command {
        ArgsCommand::Repair {
            package_dir,
            options,
        } => (package_dir, RepairConfig::from(options)),
        ArgsCommand::Unpack {
            apk_path,
            output,
            options,
        } => {
            let output_dir = output.unwrap_or_else(|| apk_path.with_extension(""));
            if let Err(e) = apktool::locate_apktool(args.apktool_path.as_deref())
                .and_then(|command| apktool::decode(command, &apk_path, &output_dir))
            {
                error!("{e}");
                return ExitCode::FAILURE;
            }
            (output_dir, RepairConfig::from(options))
        }
    };

    let report = repair(&package_dir, &config);
    match report.status() {
        RepairStatus::Succeeded => {
            info!("{report}");
            ExitCode::SUCCESS
        }
        RepairStatus::Partial => {
            warn!("{report}");
            ExitCode::SUCCESS
        }
        RepairStatus::Failed => {
            error!("{report}");
            ExitCode::FAILURE
        }
    }
}
