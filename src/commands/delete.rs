//! `microdeploy delete <CPI_RELEASE> [--yes]`

use anyhow::{Context as _, Result};
use deployer::DeleteCommand;
use std::path::Path;

use crate::Context;
use crate::paths;
use crate::ui;

pub fn run(ctx: &Context, cpi_release: &Path, yes: bool) -> Result<()> {
    let release = paths::absolutize(cpi_release)?;
    let config = super::load_user_config()?;

    if !yes {
        let target = config
            .deployment_file
            .as_deref()
            .map_or_else(|| "the current deployment".to_string(), |p| p.display().to_string());
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Delete the VM, disk and stemcell of {target}?"))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            ui::info("Aborted");
            return Ok(());
        }
    }

    let deps = super::dependencies(ctx, &config)?;
    DeleteCommand::new(config, deps)
        .run(&release)
        .context("Delete failed")?;

    if !ctx.quiet {
        ui::success("Deployment deleted");
    }
    Ok(())
}
