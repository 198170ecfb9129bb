//! autotrim CLI - PDF page trimming tool

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use autotrim::parser::{LopdfBackend, PdfBackend};
use autotrim::{
    apply_manual_crops, detect_format_from_path, BoxSet, ManualSelection, PageOutcome,
    PageSelection, SourceDocument, TrimEvent, TrimMode, TrimOptions, TrimOutput,
};

#[derive(Parser)]
#[command(name = "autotrim")]
#[command(version)]
#[command(about = "Trim PDF pages to their visible content", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trim every page around its text
    Text {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "FILE", default_value = "auto_trimmed.pdf")]
        output: PathBuf,

        /// Padding around the content, in points [default: 18]
        #[arg(long, env = "AUTOTRIM_PADDING")]
        padding: Option<f64>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Trim every page around its rendered ink
    Pixel {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "FILE", default_value = "auto_trimmed.pdf")]
        output: PathBuf,

        /// Padding around the content, in points [default: 12]
        #[arg(long, env = "AUTOTRIM_PADDING")]
        padding: Option<f64>,

        /// Render scale
        #[arg(long, env = "AUTOTRIM_SCALE", default_value = "1.25")]
        scale: f64,

        /// Sample every Nth pixel row and column
        #[arg(long, default_value = "2")]
        stride: usize,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Inset the first page's CropBox by a fixed margin
    Margin {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "FILE", default_value = "cropped.pdf")]
        output: PathBuf,

        /// Margin in points
        #[arg(long, default_value = "40")]
        margin: f64,

        /// Write a JSON report to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Set Producer and ModDate in the output
        #[arg(long)]
        stamp: bool,
    },

    /// Apply crops drawn on rendered page previews
    Manual {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// JSON file with an array of selections
        #[arg(short, long, value_name = "FILE")]
        selections: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "FILE", default_value = "manual_cropped.pdf")]
        output: PathBuf,

        /// Write a JSON report to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Set Producer and ModDate in the output
        #[arg(long)]
        stamp: bool,
    },

    /// Show document and page box information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

/// Options shared by the analyzing subcommands.
#[derive(Args)]
struct CommonArgs {
    /// Page range (e.g., "1-10", "1,3,5")
    #[arg(long)]
    pages: Option<String>,

    /// Boxes to rewrite ("all" or e.g. "crop,trim")
    #[arg(long, default_value = "all")]
    boxes: String,

    /// Analyze pages one at a time
    #[arg(long)]
    sequential: bool,

    /// Write a JSON report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Set Producer and ModDate in the output
    #[arg(long)]
    stamp: bool,
}

impl CommonArgs {
    fn apply(&self, mut options: TrimOptions) -> Result<TrimOptions, Box<dyn std::error::Error>> {
        if let Some(p) = &self.pages {
            let selection =
                PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?;
            options = options.with_pages(selection);
        }
        let boxes: BoxSet = self
            .boxes
            .parse()
            .map_err(|e| format!("Invalid box list: {}", e))?;
        Ok(options
            .with_boxes(boxes)
            .with_parallel(!self.sequential)
            .with_metadata_stamp(self.stamp))
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Text {
            input,
            output,
            padding,
            common,
        } => {
            let mut options = TrimOptions::for_mode(TrimMode::Text);
            if let Some(padding) = padding {
                options = options.with_padding(padding);
            }
            common
                .apply(options)
                .and_then(|options| cmd_trim(&input, &output, options, common.report.as_deref()))
        }
        Commands::Pixel {
            input,
            output,
            padding,
            scale,
            stride,
            common,
        } => {
            let mut options = TrimOptions::for_mode(TrimMode::Pixel)
                .with_scale(scale)
                .with_stride(stride);
            if let Some(padding) = padding {
                options = options.with_padding(padding);
            }
            common
                .apply(options)
                .and_then(|options| cmd_trim(&input, &output, options, common.report.as_deref()))
        }
        Commands::Margin {
            input,
            output,
            margin,
            report,
            stamp,
        } => {
            let options = TrimOptions::for_mode(TrimMode::FixedMargin)
                .with_margin(margin)
                .with_metadata_stamp(stamp);
            cmd_trim(&input, &output, options, report.as_deref())
        }
        Commands::Manual {
            input,
            selections,
            output,
            report,
            stamp,
        } => cmd_manual(&input, &selections, &output, report.as_deref(), stamp),
        Commands::Info { input } => cmd_info(&input),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_trim(
    input: &Path,
    output: &Path,
    options: TrimOptions,
    report: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = SourceDocument::open(input)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Analyzing ({} mode)...", options.mode));

    let (tx, rx) = crossbeam_channel::unbounded();
    let options = options.with_progress(tx);

    let trimmed = thread::scope(|scope| {
        let progress = scope.spawn(|| {
            for event in rx.iter() {
                match event {
                    TrimEvent::Started { total_pages } => pb.set_length(total_pages as u64),
                    TrimEvent::PageAnalyzed { .. } => pb.inc(1),
                    TrimEvent::PageSkipped { page, reason } => {
                        pb.println(format!("{} page {}: {}", "Skipped".yellow(), page, reason))
                    }
                    TrimEvent::PageTrimmed { .. } => pb.set_message("Writing boxes..."),
                    TrimEvent::Finished { .. } => {}
                }
            }
        });

        let result = autotrim::trim::trim(&source, &options);
        // Dropping the options closes the channel and ends the progress loop.
        drop(options);
        let _ = progress.join();
        result
    })?;

    pb.finish_with_message("Done!");
    write_output(output, &trimmed, report)
}

fn cmd_manual(
    input: &Path,
    selections: &Path,
    output: &Path,
    report: Option<&Path>,
    stamp: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = SourceDocument::open(input)?;
    let selections: Vec<ManualSelection> = serde_json::from_str(&fs::read_to_string(selections)?)
        .map_err(|e| format!("Invalid selections file: {}", e))?;

    let options = TrimOptions::default().with_metadata_stamp(stamp);
    let trimmed = apply_manual_crops(&source, &selections, &options)?;
    write_output(output, &trimmed, report)
}

fn write_output(
    output: &Path,
    trimmed: &TrimOutput,
    report: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    trimmed.save(output)?;

    println!(
        "{} {} of {} pages trimmed, {} skipped",
        "Done!".green().bold(),
        trimmed.report.trimmed_count(),
        trimmed.report.page_count,
        trimmed.report.skipped_count()
    );
    for page in &trimmed.report.pages {
        if let PageOutcome::Trimmed {
            region, fallback, ..
        } = &page.outcome
        {
            let note = if *fallback { " (full page)" } else { "" };
            println!("  {} page {}: {}{}", "├─".dimmed(), page.page, region, note.dimmed());
        }
    }
    println!("{} {}", "Saved to".green(), output.display());

    if let Some(path) = report {
        fs::write(path, trimmed.report.to_json()?)?;
        println!("{} {}", "Report saved to".green(), path.display());
    }

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let format = detect_format_from_path(input)?;
    let source = SourceDocument::open(input)?;
    let backend = LopdfBackend::load_bytes(source.as_bytes())?;
    let pages = backend.pages();

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), format);
    println!("{}: {}", "Size".bold(), source.len());
    println!("{}: {}", "Pages".bold(), pages.len());

    println!();
    println!("{}", "Visible Page Boxes".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    for (number, page) in &pages {
        let geometry = backend.page_geometry(*page);
        if geometry.is_valid() {
            println!(
                "{} {}: {:.2} x {:.2} at ({:.2}, {:.2})",
                "Page".bold(),
                number,
                geometry.width,
                geometry.height,
                geometry.origin_x,
                geometry.origin_y
            );
        } else {
            println!("{} {}: {}", "Page".bold(), number, "invalid page box".red());
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "autotrim".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF page trimming tool");
    println!();
    println!("License: MIT");
}
