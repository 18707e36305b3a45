//! Buildwright Engine - harness entry point.
//!
//! Compiles a JSON catalog, generates one random character, repairs it and
//! prints the result as JSON.

use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buildwright_domain::{Build, EntityDefinition, Value, ViolationSignal};
use buildwright_engine::infrastructure::settings::EngineSettings;
use buildwright_engine::use_cases::BuildUseCases;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    inputs: &'a std::collections::BTreeMap<String, Value>,
    residual: Vec<ViolationSignal>,
    passes_used: u32,
    picks: usize,
}

fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buildwright_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = EngineSettings::from_env();
    let catalog_path = std::env::var("BUILDWRIGHT_CATALOG")
        .map(PathBuf::from)
        .context("BUILDWRIGHT_CATALOG must name a JSON catalog file")?;
    let level: i64 = std::env::var("BUILDWRIGHT_LEVEL")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(settings.default_level);

    tracing::info!(catalog = %catalog_path.display(), level, "Starting Buildwright Engine");

    let content = std::fs::read_to_string(&catalog_path)
        .with_context(|| format!("Failed to read catalog '{}'", catalog_path.display()))?;
    let catalog: Vec<EntityDefinition> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog '{}'", catalog_path.display()))?;

    let mut cases = BuildUseCases::from_settings(settings)?;
    for error in cases.compile_catalog(&catalog) {
        tracing::warn!(error = %error, "Entity skipped");
    }
    for diagnostic in cases.compiler().diagnostics() {
        tracing::warn!(%diagnostic, "Catalog field ignored");
    }

    let mut build = Build::new().with_input("level", level);
    let generated = cases.randomize_all(&mut build);
    let repaired = cases.repair(&mut build);

    let report = Report {
        inputs: build.inputs(),
        residual: repaired.residual,
        passes_used: repaired.passes_used,
        picks: generated.mutations.len() + repaired.mutations.len(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
