mod args;
mod device;

use args::Args;
use clap::Parser;
use evaluation::{Evaluation, Evaluator};
use katago::{EvaluatorConfig, KataGoEvaluator};
use log::{debug, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode, WriteLogger};
use std::error::Error;
use std::fs::File;
use std::time::Instant;

fn main() -> Result<(), Box<dyn Error>> {
    let args = init()?;

    let device = device::get_device(args.device, args.gpu)?;

    let config = EvaluatorConfig {
        conservative_pass: args.conservative_pass,
        ..EvaluatorConfig::default()
    };
    let evaluator = KataGoEvaluator::from_file(&args.model, &device, config)?;

    let position = args.position();
    let start = Instant::now();
    let evaluation = evaluator.evaluate(&position)?;
    debug!("Evaluated in {:?}", start.elapsed());

    print_evaluation(&evaluator.name(), &evaluation, args.top);

    evaluator.release();
    Ok(())
}

fn init() -> Result<Args, Box<dyn Error>> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    if let Some(log_file) = &args.log_file {
        WriteLogger::init(level, Config::default(), File::create(log_file)?)?;
    } else {
        TermLogger::init(
            level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )?;
    }

    Ok(args)
}

fn print_evaluation(name: &str, evaluation: &Evaluation, top: usize) {
    println!("{}", name);
    println!("to move      {}", evaluation.to_move);
    println!(
        "winrate      {:.1}% (white {:.1}%)",
        evaluation.winrate() * 100.0,
        evaluation.white_winrate() * 100.0
    );
    println!(
        "score        {:+.1} +/- {:.1} (lead {:+.1}, white {:+.1})",
        evaluation.score_mean,
        evaluation.score_stdev,
        evaluation.score_lead,
        evaluation.white_score_lead()
    );
    println!("score value  {:+.3}", evaluation.score_value);
    println!("pass         {:.1}%", evaluation.pass_probability * 100.0);

    for (point, probability) in evaluation.top_moves(top) {
        println!("  {:<4} {:5.1}%", point.to_string(), probability * 100.0);
    }
}
