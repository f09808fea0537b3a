/// Prompt Preview: renders the prompt for a parameter file.
///
/// Usage: prompt_preview <params.ron> [--genres <file.ron>] [--token <seed>]
///
/// `--genres` may be given more than once; later files override earlier
/// ones. `--token` appends a uniqueness token drawn from the given seed.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::process;
use story_forge::core::prompt::{with_uniqueness_token, PromptBuilder};
use story_forge::core::structure::GenreStructures;
use story_forge::schema::params::StoryParameters;
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
        print_usage();
        process::exit(0);
    }

    let params_path = &args[1];
    let mut genre_files = Vec::new();
    let mut token_seed: Option<u64> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--genres" if i + 1 < args.len() => {
                i += 1;
                genre_files.push(args[i].clone());
            }
            "--token" if i + 1 < args.len() => {
                i += 1;
                match args[i].parse() {
                    Ok(seed) => token_seed = Some(seed),
                    Err(_) => {
                        eprintln!("ERROR: --token expects an unsigned integer, got '{}'", args[i]);
                        process::exit(1);
                    }
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let params = match load_params(Path::new(params_path)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: Failed to load parameters from {}: {}", params_path, e);
            process::exit(1);
        }
    };

    let mut structures = GenreStructures::builtin();
    for path in &genre_files {
        match GenreStructures::load_from_ron(Path::new(path)) {
            Ok(table) => {
                tracing::info!(path = %path, "loaded genre structures");
                structures.merge(table);
            }
            Err(e) => {
                eprintln!("ERROR: Failed to load genre file {}: {}", path, e);
                process::exit(1);
            }
        }
    }

    if !structures.contains(params.genre()) {
        eprintln!(
            "NOTE: no structure for genre '{}', using the default beats",
            params.genre()
        );
    }

    let prompt = PromptBuilder::new(structures).build(&params);
    match token_seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            println!("{}", with_uniqueness_token(&prompt, &mut rng));
        }
        None => println!("{}", prompt),
    }
}

fn load_params(path: &Path) -> Result<StoryParameters, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    ron::from_str(&contents).map_err(|e| e.to_string())
}

fn print_usage() {
    println!("Usage: prompt_preview <params.ron> [--genres <file.ron>] [--token <seed>]");
}
