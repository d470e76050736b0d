use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use rchain_cookbook::commands::config::{self, ConfigArgs};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("RCHAIN_GIT_SHA"),
    ", built ",
    env!("RCHAIN_BUILD_TS"),
    ")"
);

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  rchain config check\n  RCHAIN_PROFILE=claude rchain config show\n  rchain completion bash > ~/.local/share/bash-completion/completions/rchain\n\nTutorials ship as separate binaries, e.g. `cargo run --bin chat_basics`.";

#[derive(Debug, Parser)]
#[command(
    name = "rchain",
    version = VERSION,
    about = "Settings and shell helpers for the rchain tutorials",
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let out = &mut io::stdout();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "rchain", out),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "rchain", out),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "rchain", out),
    }
}

fn main() {
    rchain_cookbook::script::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
