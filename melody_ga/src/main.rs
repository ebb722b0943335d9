// Melody GA: CLI entry point.
//
// Evolves a melody over the configured chord progression and writes it, with
// its backing chords, to MIDI.
// The pipeline: load config → seed population → evolve → MIDI output.
//
// Usage:
//   cargo run -p melody_ga -- [output.mid] [--config FILE] [--generations N]
//     [--population N] [--seed N] [--target SCORE] [--tempo BPM] [--parallel]
//     [--verbose]
//
// Without --config the built-in defaults are used. Command-line flags
// override values from the config file.

use melody_ga::config::EvolutionConfig;
use melody_ga::evolution::{Evolver, GenerationOutcome, GenerationReport, StopReason};
use melody_ga::midi::{Arrangement, write_midi};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

/// Print a progress line every this many generations.
const PROGRESS_INTERVAL: usize = 10;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let output_path = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("output.mid");
    let config_path: Option<String> = parse_flag(&args, "--config");
    let seed: Option<u64> = parse_flag(&args, "--seed");
    let verbose = args.iter().any(|a| a == "--verbose");

    // Library records go through the `log` facade; the subscriber's log
    // bridge picks them up.
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(if verbose { "debug" } else { "info" })
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
    {
        eprintln!("  Logging disabled: {}", e);
    }

    println!("=== Melody GA ===");

    // Load config
    println!("[1/4] Loading config...");
    let mut config = match &config_path {
        Some(path) => match EvolutionConfig::load(Path::new(path)) {
            Ok(c) => {
                println!("  Loaded {}.", path);
                c
            }
            Err(e) => {
                eprintln!("  Error loading {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => {
            println!("  Using built-in defaults.");
            EvolutionConfig::default()
        }
    };
    if let Some(n) = parse_flag(&args, "--generations") {
        config.generations = n;
    }
    if let Some(n) = parse_flag(&args, "--population") {
        config.population_size = n;
    }
    if let Some(t) = parse_flag(&args, "--tempo") {
        config.tempo_bpm = t;
    }
    if let Some(score) = parse_flag(&args, "--target") {
        config.target_score = Some(score);
    }
    if args.iter().any(|a| a == "--parallel") {
        config.parallel_evaluation = true;
    }

    println!("  Output: {}", output_path);
    println!(
        "  Population: {}, generations: {}, elites: {}",
        config.population_size, config.generations, config.elitism_count
    );
    println!(
        "  Melody: {} steps ({} per beat), pitches {}..={}",
        config.total_steps, config.steps_per_beat, config.pitch_min, config.pitch_max
    );
    println!("  Tempo: {} BPM", config.tempo_bpm);
    if let Some(target) = config.target_score {
        println!("  Target score: {:.1}", target);
    }
    if let Some(s) = seed {
        println!("  Seed: {}", s);
    }

    let rng = if let Some(s) = seed {
        StdRng::seed_from_u64(s)
    } else {
        StdRng::from_os_rng()
    };

    // Seed population
    println!("[2/4] Sampling initial population...");
    let mut evolver = match Evolver::new(config, rng) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("  Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Evolve
    println!("[3/4] Evolving...");
    let mut progress = |report: &GenerationReport| {
        if report.generation % PROGRESS_INTERVAL == 0 || report.outcome == GenerationOutcome::Final
        {
            println!(
                "  Gen {:>4}: best {:>8.2}, mean {:>8.2}, stagnation {:>3}, mutation {:.2}",
                report.generation,
                report.best_score,
                report.mean_score,
                report.stagnation_counter,
                report.mutation_rate
            );
        }
        if report.breakthrough {
            println!("  Gen {:>4}: breakthrough!", report.generation);
        }
        if report.outcome == GenerationOutcome::Collapsed {
            println!("  Gen {:>4}: population collapsed", report.generation);
        }
    };
    let outcome = match evolver.run(&mut progress) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("  Evolution failed: {}", e);
            std::process::exit(1);
        }
    };
    println!(
        "  Generations: {} ({})",
        outcome.generations_run,
        match outcome.stop_reason {
            StopReason::BudgetExhausted => "budget exhausted",
            StopReason::TargetReached => "target reached",
        }
    );
    println!("  Collapses: {}", outcome.collapses);
    println!("  Best fitness: {:.2}", outcome.best.fitness);

    match evolver.evaluator().breakdown(&outcome.best.melody) {
        Ok(breakdown) => {
            for c in &breakdown.components {
                println!(
                    "    {:<20} {:>8.2} x {:.1} = {:>8.2}",
                    c.heuristic.name(),
                    c.raw,
                    c.weight,
                    c.weighted
                );
            }
        }
        Err(e) => eprintln!("  Could not break down fitness: {}", e),
    }
    println!("  Melody: {}", describe(outcome.best.melody.steps()));

    // Write MIDI
    println!("[4/4] Writing MIDI to {}...", output_path);
    let arrangement = Arrangement::from_config(outcome.best.melody, evolver.config());
    match write_midi(&arrangement, Path::new(output_path)) {
        Ok(()) => {
            let beats = arrangement.melody.len() as f64 / arrangement.steps_per_beat as f64;
            let seconds = beats * 60.0 / arrangement.tempo_bpm as f64;
            println!(
                "  Done! {} notes, duration {:.0}s",
                arrangement.melody_notes().len(),
                seconds
            );
        }
        Err(e) => {
            eprintln!("  Error writing MIDI: {}", e);
            std::process::exit(1);
        }
    }

    println!();
    println!("Play with: timidity {} (or any MIDI player)", output_path);
}

/// Note names for a step row, `-` for rests.
fn describe(steps: &[u8]) -> String {
    steps
        .iter()
        .map(|&p| match p {
            0 => "-".to_string(),
            _ => format!("{}{}", pitch_name(p), p as i32 / 12 - 1),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn pitch_name(pitch: u8) -> &'static str {
    match pitch % 12 {
        0 => "C", 1 => "C#", 2 => "D", 3 => "Eb",
        4 => "E", 5 => "F", 6 => "F#", 7 => "G",
        8 => "Ab", 9 => "A", 10 => "Bb", 11 => "B",
        _ => "?"
    }
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
