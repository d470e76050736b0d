use clap::{Args, Subcommand};

use crate::config::{self, ConfigError, Settings};

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    #[command(about = "Validate the config file and its profiles")]
    Check {
        #[arg(long)]
        profile: Option<String>,
    },
    #[command(about = "Print the settings tutorials will run with")]
    Show,
}

pub fn run(args: ConfigArgs) -> Result<(), ConfigError> {
    match args.command {
        ConfigSubcommand::Check { profile } => {
            let path = config::validate_config(profile.as_deref())?;
            println!("config OK: {}", path.display());
        }
        ConfigSubcommand::Show => {
            let settings = Settings::load()?;
            println!("provider: {}", settings.provider);
            println!("model: {}", settings.model);
            println!("embedding_model: {}", settings.embedding_model);
            if let Some(temperature) = settings.temperature {
                println!("temperature: {temperature}");
            }
            println!("chroma_url: {}", settings.chroma_url);
            println!("data_dir: {}", settings.data_dir.display());
            println!("retries: {}", settings.retry.retries);
        }
    }
    Ok(())
}
