// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crosswalk::{path::default_config_path, Exporter, MetadataRecord, RecordStore};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::write,
    io::{stdout, Write},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "crosswalk [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config = match self.config {
            Some(path) => path,
            None => default_config_path()?,
        };

        match self.command {
            Command::Export(opts) => run_export(config, opts),
            Command::Profiles => run_profiles(config),
            Command::Check => run_check(config),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Export records through profile.
    #[command(override_usage = "crosswalk export [options] <profile> --records <glob>...")]
    Export(ExportOptions),

    /// List configured profiles.
    #[command(override_usage = "crosswalk profiles [options]")]
    Profiles,

    /// Load every profile template and report problems.
    #[command(override_usage = "crosswalk check [options]")]
    Check,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExportOptions {
    /// Name of profile to export with.
    #[arg(required = true, value_name = "profile")]
    pub profile: String,

    /// Glob patterns of record files to load.
    #[arg(short, long, required = true, num_args = 1.., value_name = "glob")]
    pub records: Vec<String>,

    /// Only export records with these ids.
    #[arg(short, long, value_name = "id")]
    pub id: Vec<String>,

    /// Write export to path instead of standard output.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,

    /// Write one file per record into output directory.
    #[arg(short, long, requires = "output")]
    pub split: bool,

    /// Skip records the profile cannot export.
    #[arg(long)]
    pub skip_unsupported: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run_export(config: PathBuf, opts: ExportOptions) -> Result<()> {
    let exporter = Exporter::open(&config)?;
    let crosswalk = exporter.crosswalk(&opts.profile)?;
    let store = RecordStore::load_all(record_files(&opts.records)?)?;

    let mut subjects = if opts.id.is_empty() {
        store.records().to_vec()
    } else {
        opts.id
            .iter()
            .map(|id| {
                store
                    .get(id)
                    .cloned()
                    .ok_or_else(|| anyhow!("record {id:?} does not exist"))
            })
            .collect::<Result<Vec<MetadataRecord>>>()?
    };

    if opts.skip_unsupported {
        subjects.retain(|record| {
            let supported = crosswalk.can_disseminate(record);
            if !supported {
                warn!("skip record {:?}, profile {:?} cannot export it", record.id, opts.profile);
            }
            supported
        });
    }

    if opts.split {
        // INVARIANT: clap requires an output path for split exports.
        let dir = opts.output.unwrap_or_default();
        mkdirp::mkdirp(&dir).with_context(|| format!("failed to create {:?}", dir.display()))?;

        let bar = ProgressBar::new(subjects.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{elapsed_precise:.green}  {msg:<30}  [{wide_bar:.yellow/blue}] {pos}/{len}")?
                .progress_chars("-Cco."),
        );
        for subject in &subjects {
            bar.set_message(subject.id.clone());
            let export = exporter.export(&opts.profile, std::slice::from_ref(subject), Some(&store))?;
            let path = dir.join(format!("{}-{}", subject.id, export.file_name));
            write(&path, export.content).with_context(|| format!("failed to write {:?}", path.display()))?;
            bar.inc(1);
        }
        bar.finish_with_message("done");
        info!("exported {} records into {:?}", subjects.len(), dir.display());

        return Ok(());
    }

    let export = exporter.export(&opts.profile, &subjects, Some(&store))?;
    match opts.output {
        Some(path) => {
            write(&path, &export.content).with_context(|| format!("failed to write {:?}", path.display()))?;
            info!("exported {} records as {} to {:?}", subjects.len(), export.mime_type, path.display());
        }
        None => stdout().write_all(&export.content)?,
    }

    Ok(())
}

fn run_profiles(config: PathBuf) -> Result<()> {
    let exporter = Exporter::open(&config)?;
    let mut out = stdout().lock();
    for profile in exporter.profiles() {
        let entity_type = profile.entity_type.as_deref().unwrap_or("any");
        writeln!(
            out,
            "{:<24} {:<6} {:<12} {}",
            profile.name,
            format!("{:?}", profile.kind).to_lowercase(),
            entity_type,
            profile.mime_type()
        )?;
    }

    Ok(())
}

fn run_check(config: PathBuf) -> Result<()> {
    let exporter = Exporter::open(&config)?;
    info!("all {} profiles of {:?} are valid", exporter.profiles().count(), config.display());
    Ok(())
}

fn record_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let expanded = shellexpand::full(pattern)?;
        let matches = glob::glob(&expanded)?.collect::<Result<Vec<_>, _>>()?;
        if matches.is_empty() {
            warn!("record pattern {pattern:?} matched nothing");
        }
        files.extend(matches);
    }

    Ok(files)
}
