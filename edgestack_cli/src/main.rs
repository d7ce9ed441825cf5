use std::path::{Path, PathBuf};

use edgestack::app;
use edgestack::config::{AppConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_OUT_DIR: &str = "cdk.out";

/// given a search dir, see if the config file exists in this dir, and if so
/// return its path. If not found, back up 1 dir at a time until it is
/// found (limit 5 times)
fn find_closest_config(mut search_dir: PathBuf) -> Option<PathBuf> {
    for _ in 0..5 {
        search_dir.push(DEFAULT_CONFIG_FILE);
        if search_dir.is_file() {
            return Some(search_dir);
        }
        search_dir.pop();
        if !search_dir.pop() {
            return None;
        }
    }
    None
}

fn config_path() -> Result<PathBuf, String> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let currdir = std::env::current_dir().map_err(|e| format!("Failed to get current directory\n{e}"))?;
    find_closest_config(currdir.clone()).ok_or_else(|| format!(
        "Failed to find {DEFAULT_CONFIG_FILE} from {:?}. Set {CONFIG_ENV_VAR} or run this from a directory containing it",
        currdir,
    ))
}

fn run(out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path()?;
    println!("Loading stages from {:?}", path);
    let config = AppConfig::load(&path)?;
    debug!("loaded {} stages", config.stages.len());

    let assemblies = app::synth(&config)?;
    for assembly in assemblies.iter() {
        let dir = out_dir.join(&assembly.stage);
        assembly.write_to(&dir)?;
        println!("Synthesized stage {} to {:?}", assembly.stage, dir);
        for (i, stack) in assembly.stacks.iter().enumerate() {
            let region = stack.region.as_deref().unwrap_or("(environment agnostic)");
            if stack.dependencies.is_empty() {
                println!("  {}. {} [{region}]", i + 1, stack.stack_name);
            } else {
                println!("  {}. {} [{region}] after {}", i + 1, stack.stack_name, stack.dependencies.join(", "));
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let out_dir = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_OUT_DIR.to_string());
    if let Err(e) = run(Path::new(&out_dir)) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
