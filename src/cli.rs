//! Command line interface for aiomerge

use crate::error::MergeError;
use crate::headers::read_headers;
use crate::preflight::{Overlap, find_overlaps, plan_spans};
use crate::{MergeInput, VERSION, calculate_crc32, header_size_for_count, merge_binaries};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

/// Command line arguments for aiomerge
#[derive(Parser, Debug)]
#[command(name = "aiomerge")]
#[command(version = VERSION)]
#[command(about = "Merge firmware binaries into an AIO container image", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - only output errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge firmware binaries into a container image
    Merge(MergeArgs),
    /// Resolve placements and report overlaps without writing anything
    Check(CheckArgs),
    /// List a produced image's container and entry headers
    List(ListArgs),
    /// Recompute the entry CRCs of a produced image and compare
    Verify(VerifyArgs),
}

/// Arguments for merging binaries
#[derive(Parser, Debug)]
pub struct MergeArgs {
    /// Merge target, as `path` or `path@offset` (offset decimal or
    /// 0x-prefixed hex; without an offset the file is appended after the
    /// previous entry). Repeat in placement order.
    #[arg(short = 't', long = "target", required = true)]
    pub targets: Vec<String>,

    /// Output image file
    #[arg(short, long, default_value = "merged.aio")]
    pub output: PathBuf,
}

/// Arguments for the pre-flight check
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Merge target, as `path` or `path@offset` (same syntax as `merge`)
    #[arg(short = 't', long = "target", required = true)]
    pub targets: Vec<String>,
}

/// Arguments for listing image information
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Image file to examine
    pub image_file: PathBuf,

    /// Print in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for verifying an image
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Image file to verify
    pub image_file: PathBuf,
}

/// Parse a decimal or 0x-prefixed hexadecimal offset.
fn parse_offset(s: &str) -> std::result::Result<u32, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    };
    parsed.map_err(|_| format!("invalid offset '{s}'"))
}

/// Parse a `path` or `path@offset` target specification.
fn parse_target(spec: &str) -> std::result::Result<MergeInput, String> {
    match spec.rsplit_once('@') {
        None => Ok(MergeInput::new(spec)),
        Some((path, _)) if path.is_empty() => Err(format!("'{spec}': empty path")),
        Some((path, offset)) => {
            let offset = parse_offset(offset).map_err(|e| format!("'{spec}': {e}"))?;
            Ok(MergeInput::with_offset(path, offset))
        }
    }
}

/// Parse target specifications, dropping invalid ones with a warning.
fn collect_targets(specs: &[String]) -> Vec<MergeInput> {
    let mut inputs = Vec::with_capacity(specs.len());
    for spec in specs {
        match parse_target(spec) {
            Ok(input) => inputs.push(input),
            Err(e) => println!("{}", format!("warn: target dropped: {e}").yellow()),
        }
    }
    inputs
}

fn warn_overlap(inputs: &[MergeInput], overlap: &Overlap) {
    let earlier = &inputs[overlap.earlier.index];
    let later = &inputs[overlap.later.index];
    println!(
        "{}",
        format!(
            "warn: '{}' ({:#x}..{:#x}) overlaps '{}' ({:#x}..{:#x}); the later target wins",
            later.path.display(),
            overlap.later.start,
            overlap.later.end,
            earlier.path.display(),
            overlap.earlier.start,
            overlap.earlier.end,
        )
        .yellow()
    );
}

/// Gather `(requested offset, size)` pairs from file metadata.
///
/// Returns None when any size cannot be read; the merge will fail on that
/// source anyway with full context, so the pre-flight is skipped rather
/// than reported against a different entry list.
fn gather_sizes(inputs: &[MergeInput]) -> Option<Vec<(Option<u32>, u32)>> {
    let mut targets = Vec::with_capacity(inputs.len());
    for input in inputs {
        let len = match fs::metadata(&input.path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                println!(
                    "{}",
                    format!(
                        "warn: cannot read size of '{}', skipping pre-flight check",
                        input.path.display()
                    )
                    .yellow()
                );
                return None;
            }
        };
        if len > u32::MAX as u64 {
            return None;
        }
        targets.push((input.offset, len as u32));
    }
    Some(targets)
}

/// Main CLI handler
pub fn run_cli(args: Args) -> Result<()> {
    let verbose = args.verbose && !args.quiet;
    let quiet = args.quiet;

    match args.command {
        Commands::Merge(merge_args) => handle_merge(merge_args, verbose, quiet),
        Commands::Check(check_args) => handle_check(check_args, quiet),
        Commands::List(list_args) => handle_list(list_args, verbose),
        Commands::Verify(verify_args) => handle_verify(verify_args, verbose, quiet),
    }
}

fn handle_merge(args: MergeArgs, verbose: bool, quiet: bool) -> Result<()> {
    let inputs = collect_targets(&args.targets);
    if inputs.is_empty() {
        bail!("no valid merge targets remain");
    }

    if verbose {
        for input in &inputs {
            match input.offset {
                Some(offset) => eprintln!("target {} at {:#x}", input.path.display(), offset),
                None => eprintln!("target {} (auto-append)", input.path.display()),
            }
        }
    }

    // warn about overlapping placements before committing anything
    if let Some(targets) = gather_sizes(&inputs) {
        let spans = plan_spans(&targets)?;
        for overlap in find_overlaps(&spans) {
            warn_overlap(&inputs, &overlap);
        }
    }

    let report = merge_binaries(&inputs, &args.output)
        .with_context(|| format!("merging {} targets", inputs.len()))?;

    if !quiet {
        eprintln!("Image created successfully: {}", args.output.display());
        eprintln!(
            "Header size: {:#x}, total size: {:#x}",
            report.header_size, report.total_size
        );
    }
    Ok(())
}

fn handle_check(args: CheckArgs, quiet: bool) -> Result<()> {
    let inputs = collect_targets(&args.targets);
    if inputs.is_empty() {
        bail!("no valid targets remain");
    }

    let mut targets = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let len = fs::metadata(&input.path)
            .with_context(|| format!("cannot read size of '{}'", input.path.display()))?
            .len();
        if len > u32::MAX as u64 {
            bail!(
                "source file '{}' is too large: {} bytes",
                input.path.display(),
                len
            );
        }
        targets.push((input.offset, len as u32));
    }

    let spans = plan_spans(&targets)?;
    if !quiet {
        println!(
            "header size: {:#x} ({} entries)",
            header_size_for_count(targets.len()),
            targets.len()
        );
        for span in &spans {
            let input = &inputs[span.index];
            let requested = match input.offset {
                Some(offset) => format!("{offset:#x}"),
                None => "auto".to_string(),
            };
            println!(
                "  {:>3}: {:#010x}..{:#010x}  {} (requested {})",
                span.index,
                span.start,
                span.end,
                input.path.display(),
                requested
            );
        }
    }

    let overlaps = find_overlaps(&spans);
    if overlaps.is_empty() {
        if !quiet {
            println!("no overlaps detected");
        }
    } else {
        for overlap in &overlaps {
            warn_overlap(&inputs, overlap);
        }
    }
    Ok(())
}

fn handle_list(args: ListArgs, verbose: bool) -> Result<()> {
    if verbose {
        eprintln!("Reading image: {}", args.image_file.display());
    }

    let data = fs::read(&args.image_file)
        .with_context(|| format!("cannot read image '{}'", args.image_file.display()))?;
    let (container, entries) = read_headers(&data)?;

    if args.json {
        let value = serde_json::json!({
            "magic": String::from_utf8_lossy(&container.magic),
            "version": container.version,
            "header_size": container.header_size,
            "device_type": container.device_type,
            "firmware_version": format!("{:#010x}", container.firmware_version),
            "entry_count": container.entry_count,
            "image_size": data.len(),
            "entries": entries.iter().map(|e| serde_json::json!({
                "vendor_id": format!("{:#06x}", e.identity.vendor_id),
                "data_offset": e.data_offset,
                "data_size": e.data_size,
                "crc32": format!("{:#010x}", e.crc),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("AIO image: {}", args.image_file.display());
        println!(
            "  version {:#06x}, device type {:#04x}, firmware version {:#010x}",
            container.version, container.device_type, container.firmware_version
        );
        println!(
            "  header size {:#x}, {} entries, {} bytes total",
            container.header_size,
            container.entry_count,
            data.len()
        );
        for (index, entry) in entries.iter().enumerate() {
            println!(
                "  entry {index}: offset {:#010x} size {:#010x} crc {:#010x}",
                entry.data_offset, entry.data_size, entry.crc
            );
        }
    }
    Ok(())
}

fn handle_verify(args: VerifyArgs, verbose: bool, quiet: bool) -> Result<()> {
    if verbose {
        eprintln!("Verifying image: {}", args.image_file.display());
    }

    let data = fs::read(&args.image_file)
        .with_context(|| format!("cannot read image '{}'", args.image_file.display()))?;
    let (container, entries) = read_headers(&data)?;

    for (index, entry) in entries.iter().enumerate() {
        let start = entry.data_offset as usize;
        let end = start
            .checked_add(entry.data_size as usize)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                MergeError::invalid_image_data(format!(
                    "entry {index} window {:#x}+{:#x} lies outside the image",
                    entry.data_offset, entry.data_size
                ))
            })?;

        let computed = calculate_crc32(&data[start..end]);
        if computed != entry.crc {
            return Err(MergeError::CrcMismatch {
                index,
                expected: entry.crc,
                computed,
            }
            .into());
        }
        if !quiet {
            eprintln!("entry {index}: crc {:#010x} - OK", entry.crc);
        }
    }

    if !quiet {
        eprintln!(
            "Image verification successful: {} entries",
            container.entry_count
        );
    }
    Ok(())
}
