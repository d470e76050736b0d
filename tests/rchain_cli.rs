use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::{contains, is_empty};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SCRUBBED_ENV: &[&str] = &[
    "RCHAIN_CONFIG",
    "RCHAIN_PROFILE",
    "RCHAIN_MODEL",
    "RCHAIN_EMBEDDING_MODEL",
    "RCHAIN_CHROMA_URL",
    "RCHAIN_DATA_DIR",
    "RCHAIN_TIMEOUT",
    "RCHAIN_RETRIES",
    "RUST_LOG",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GOOGLE_API_KEY",
    "FIREWORKS_API_KEY",
    "HF_TOKEN",
    "TAVILY_API_KEY",
    "FIRECRAWL_API_KEY",
];

// Runs from a scratch dir so no `.env` up the tree leaks keys in.
fn scrubbed(mut cmd: Command, cwd: &Path) -> Command {
    for key in SCRUBBED_ENV {
        cmd.env_remove(key);
    }
    cmd.current_dir(cwd);
    cmd
}

fn rchain_cmd(cwd: &Path) -> Command {
    scrubbed(Command::new(assert_cmd::cargo::cargo_bin!("rchain")), cwd)
}

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().expect("tempdir");
    rchain_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("config").and(contains("completion")));
}

#[test]
fn bash_completion_mentions_binary() {
    let dir = TempDir::new().expect("tempdir");
    rchain_cmd(dir.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(contains("rchain"));
}

#[test]
fn config_check_accepts_valid_profiles() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        "[profiles.default]\nmodel = \"gpt-4o-mini\"\n\n[profiles.claude]\nprovider = \"anthropic\"\ntemperature = 0.2\n",
    );
    rchain_cmd(dir.path())
        .env("RCHAIN_CONFIG", &path)
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(contains("config OK"))
        .stderr(is_empty());
}

#[test]
fn config_check_rejects_unparsable_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[profiles.default\nmodel = ");
    rchain_cmd(dir.path())
        .env("RCHAIN_CONFIG", &path)
        .args(["config", "check"])
        .assert()
        .code(1)
        .stderr(contains("Failed to parse config file"));
}

#[test]
fn config_check_rejects_unknown_provider() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[profiles.odd]\nprovider = \"mistral\"\n");
    rchain_cmd(dir.path())
        .env("RCHAIN_CONFIG", &path)
        .args(["config", "check"])
        .assert()
        .code(1)
        .stderr(contains("mistral"));
}

#[test]
fn config_check_reports_missing_profile() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[profiles.default]\nmodel = \"gpt-4o\"\n");
    rchain_cmd(dir.path())
        .env("RCHAIN_CONFIG", &path)
        .args(["config", "check", "--profile", "missing"])
        .assert()
        .code(1)
        .stderr(contains("Profile 'missing' not found"));
}

#[test]
fn config_check_requires_profiles_section() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "# nothing here\n");
    rchain_cmd(dir.path())
        .env("RCHAIN_CONFIG", &path)
        .args(["config", "check"])
        .assert()
        .code(1)
        .stderr(contains("does not contain a [profiles] section"));
}

#[test]
fn config_check_reports_unreadable_file() {
    let dir = TempDir::new().expect("tempdir");
    rchain_cmd(dir.path())
        .env("RCHAIN_CONFIG", dir.path().join("absent.toml"))
        .args(["config", "check"])
        .assert()
        .code(1)
        .stderr(contains("Failed to read config file"));
}

#[test]
fn config_show_applies_profile_then_env() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        "[profiles.claude]\nprovider = \"anthropic\"\nretries = 5\nchroma_url = \"http://chroma:8000\"\n",
    );
    rchain_cmd(dir.path())
        .env("RCHAIN_CONFIG", &path)
        .env("RCHAIN_PROFILE", "claude")
        .env("RCHAIN_RETRIES", "2")
        .env("RCHAIN_DATA_DIR", "/srv/books")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            contains("provider: anthropic")
                .and(contains("chroma_url: http://chroma:8000"))
                .and(contains("data_dir: /srv/books"))
                .and(contains("retries: 2")),
        );
}

#[test]
fn chat_basics_fails_without_api_key() {
    let dir = TempDir::new().expect("tempdir");
    scrubbed(
        Command::new(assert_cmd::cargo::cargo_bin!("chat_basics")),
        dir.path(),
    )
    .assert()
    .code(1)
    .stdout(is_empty())
    .stderr(contains("OPENAI_API_KEY is not set in the environment"));
}

#[test]
fn chat_basics_rejects_bad_timeout() {
    let dir = TempDir::new().expect("tempdir");
    scrubbed(
        Command::new(assert_cmd::cargo::cargo_bin!("chat_basics")),
        dir.path(),
    )
    .env("RCHAIN_TIMEOUT", "soon")
    .assert()
    .code(1)
    .stderr(contains("Invalid value 'soon' for RCHAIN_TIMEOUT"));
}

#[test]
fn text_splitting_reports_missing_book() {
    let dir = TempDir::new().expect("tempdir");
    scrubbed(
        Command::new(assert_cmd::cargo::cargo_bin!("rag_text_splitting")),
        dir.path(),
    )
    .env("RCHAIN_DATA_DIR", dir.path())
    .assert()
    .code(1)
    .stderr(contains("romeo_and_juliet.txt does not exist. Please check the path."));
}

#[test]
fn embedding_models_reports_missing_book() {
    let dir = TempDir::new().expect("tempdir");
    scrubbed(
        Command::new(assert_cmd::cargo::cargo_bin!("rag_embedding_models")),
        dir.path(),
    )
    .env("RCHAIN_DATA_DIR", dir.path())
    .assert()
    .code(1)
    .stderr(contains("odyssey.txt does not exist. Please check the path."));
}

#[test]
fn chain_branching_lists_review_choices() {
    let dir = TempDir::new().expect("tempdir");
    scrubbed(
        Command::new(assert_cmd::cargo::cargo_bin!("chain_branching")),
        dir.path(),
    )
    .arg("--help")
    .assert()
    .success()
    .stdout(contains("good").and(contains("neutral")).and(contains("unsure")));
}
