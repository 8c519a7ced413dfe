//! `microdeploy deployment [PATH]`

use anyhow::{Context as _, Result, bail};
use deployer::Manifest;
use std::path::Path;

use crate::Context;
use crate::paths;
use crate::ui;

pub fn run(ctx: &Context, manifest: Option<&Path>) -> Result<()> {
    match manifest {
        Some(path) => set(ctx, path),
        None => show(),
    }
}

fn set(ctx: &Context, path: &Path) -> Result<()> {
    let path = paths::absolutize(path)?;
    if !path.is_file() {
        bail!("Deployment manifest not found: {}", path.display());
    }
    let manifest = Manifest::load(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config_path = paths::user_config_file()?;
    let mut config = super::load_user_config()?;
    config.deployment_file = Some(path.clone());
    config
        .save(&config_path)
        .with_context(|| format!("Failed to save {}", config_path.display()))?;

    if !ctx.quiet {
        ui::success(&format!(
            "Deployment set to '{}' ({})",
            manifest.name,
            path.display()
        ));
    }
    Ok(())
}

fn show() -> Result<()> {
    let config = super::load_user_config()?;
    match config.deployment_file.as_deref() {
        Some(path) => {
            println!("{}", path.display());
            if !path.exists() {
                ui::warn("The manifest no longer exists");
            }
        }
        None => ui::warn("No deployment set. Run 'microdeploy deployment <manifest>' first"),
    }
    Ok(())
}
