//! Config file commands

use std::fs;
use std::path::Path;

use huddle_core::Config;

use crate::cli::ConfigCommand;
use crate::error::AppResult;

pub fn run(cmd: ConfigCommand, path: &Path, config: &Config) -> AppResult<()> {
    match cmd {
        ConfigCommand::Show => print!("{}", config.to_toml()?),
        ConfigCommand::Path => println!("{}", path.display()),
        ConfigCommand::Init => {
            if path.exists() {
                println!("Config already exists at {}", path.display());
                return Ok(());
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, Config::default().to_toml()?)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
