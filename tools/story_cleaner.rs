/// Story Cleaner: runs the post-processing pass over a raw model output.
///
/// Usage: story_cleaner <raw.txt> [--config <postprocess.ron>]
///
/// Prints the formatted story followed by its statistics. Exits with
/// status 1 when the text has no usable content.

use std::path::Path;
use std::process;
use story_forge::core::postprocess::{PostProcessConfig, PostProcessor};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_cleaner <raw.txt> [--config <postprocess.ron>]");
        process::exit(0);
    }

    let raw_path = &args[1];
    let mut config_path = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            i += 1;
            config_path = Some(args[i].clone());
        } else {
            eprintln!("Unknown argument: {}", args[i]);
            process::exit(1);
        }
        i += 1;
    }

    let config = match config_path {
        Some(ref path) => match PostProcessConfig::load_from_ron(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to load config {}: {}", path, e);
                process::exit(1);
            }
        },
        None => PostProcessConfig::default(),
    };

    let raw = match std::fs::read_to_string(raw_path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("ERROR: Failed to read {}: {}", raw_path, e);
            process::exit(1);
        }
    };

    let story = match PostProcessor::new(config).process(&raw) {
        Ok(story) => story,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    println!("{}", story.text);
    println!("\n=== Statistics ===\n");
    println!("Words:        {}", story.stats.words);
    println!("Sentences:    {}", story.stats.sentences);
    println!("Paragraphs:   {}", story.stats.paragraphs);
    println!("Reading time: {} min", story.stats.reading_time);
}
