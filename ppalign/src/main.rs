mod args;

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use serde::Serialize;

use libppalign::align::structs::Alignment;
use libppalign::align::AlignmentEngine;
use libppalign::score::{ScoreConfig, ScoreMatrix, StatisticalParams};
use libppalign::structs::profile_file::read_profile;

use crate::args::Args;

#[derive(Serialize)]
struct RunSummary<'a> {
    alignment: &'a Alignment,
    statistics: &'a StatisticalParams,
}

fn main() -> anyhow::Result<()> {
    color_backtrace::install();
    let args = Args::parse();

    let (query, query_gaps) = read_profile(&args.query)?;
    let (subject, subject_gaps) = read_profile(&args.subject)?;

    let config = ScoreConfig {
        deletion_coefficient: args.deletion_coefficient,
        information_threshold: args.info_threshold,
        ..ScoreConfig::default()
    };

    let mut matrix = ScoreMatrix::build(&subject, &query, args.mask_policy.0, &config)?;

    // statistics failures are non-fatal: the raw alignment score stays
    // usable and the report falls back to the reference expectation
    let statistics = match args.target_lambda {
        Some(target) => matrix.scale_to_target_lambda(target),
        None => matrix.compute_statistics(),
    };
    if let Err(error) = statistics {
        eprintln!(
            "{} statistics unavailable: {error}",
            "warning:".yellow().bold()
        );
    }

    if let Some(path) = &args.dump_matrix {
        let file = File::create(path).context(format!(
            "failed to create matrix dump file: {}",
            path.to_string_lossy()
        ))?;
        matrix.dump(&mut BufWriter::new(file))?;
    }

    let mut engine = AlignmentEngine::new(
        &query,
        &query_gaps,
        &subject,
        &subject_gaps,
        &matrix,
        &config,
        args.ungapped,
    )?;
    let alignment = engine.run();

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => {
            let file = File::create(path).context(format!(
                "failed to create output file: {}",
                path.to_string_lossy()
            ))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(std::io::stdout().lock()),
    };

    if args.json {
        serde_json::to_writer_pretty(
            &mut out,
            &RunSummary {
                alignment: &alignment,
                statistics: matrix.params(),
            },
        )?;
        writeln!(out)?;
    } else {
        write!(out, "{}", alignment.report())?;
    }

    Ok(())
}
