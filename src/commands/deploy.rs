//! `microdeploy deploy <CPI_RELEASE>`

use anyhow::{Context as _, Result};
use deployer::DeployCommand;
use std::path::Path;

use crate::Context;
use crate::paths;
use crate::ui;

pub fn run(ctx: &Context, cpi_release: &Path) -> Result<()> {
    let release = paths::absolutize(cpi_release)?;
    let config = super::load_user_config()?;
    let deps = super::dependencies(ctx, &config)?;

    DeployCommand::new(config, deps)
        .run(&release)
        .context("Deploy failed")?;

    if !ctx.quiet {
        ui::success("Deployment is up to date");
    }
    Ok(())
}
