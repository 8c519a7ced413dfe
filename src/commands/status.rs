//! `microdeploy status`: what the state file says is deployed

use anyhow::{Context as _, Result};
use deploystate::{DeploymentState, FileStateRepository, RandomUuidGenerator, StateRepository};
use std::sync::Arc;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let config = super::load_user_config()?;
    let manifest = config.deployment_file()?;
    let state_path = config.state_file_path()?;

    if !state_path.exists() {
        ui::header("Deployment");
        ui::kv("Manifest", &manifest.display().to_string());
        ui::dim("Nothing deployed yet");
        return Ok(());
    }

    let store = FileStateRepository::new(&state_path, Arc::new(RandomUuidGenerator));
    let state = store
        .load()
        .with_context(|| format!("Failed to read {}", state_path.display()))?;

    ui::header("Deployment");
    ui::kv("Manifest", &manifest.display().to_string());
    ui::kv("State", &state_path.display().to_string());
    ui::kv("Director UUID", &state.uuid);

    print_current(&state);
    if ctx.verbose > 0 {
        print_history(&state);
    }
    Ok(())
}

fn print_current(state: &DeploymentState) {
    ui::section("Current");
    ui::kv("VM", &ui::or_dash(state.current_vm_cid.as_deref()));

    let disk = state
        .current_disk_id
        .as_deref()
        .map(|id| match state.find_disk(id) {
            Some(disk) => format!("{} ({})", disk.cid, ui::format_mib(disk.size)),
            None => format!("{id} (missing record)"),
        });
    ui::kv("Disk", &ui::or_dash(disk.as_deref()));

    let stemcell = state
        .current_stemcell_id
        .as_deref()
        .map(|id| match state.find_stemcell(id) {
            Some(s) => format!("{} ({}/{})", s.cid, s.name, s.version),
            None => format!("{id} (missing record)"),
        });
    ui::kv("Stemcell", &ui::or_dash(stemcell.as_deref()));

    let unused = state.unused_disk_ids.len() + state.unused_stemcell_ids.len();
    if unused > 0 {
        ui::warn(&format!(
            "{unused} unused resource(s) left by an interrupted run; deploy or delete again to remove them"
        ));
    }

    if !state.has_current_resources() {
        ui::dim("Nothing deployed");
    }
}

fn print_history(state: &DeploymentState) {
    ui::section(&format!("Disk records ({})", state.disks.len()));
    for disk in &state.disks {
        ui::kv(&disk.id, &format!("{} ({})", disk.cid, ui::format_mib(disk.size)));
    }

    ui::section(&format!("Stemcell records ({})", state.stemcells.len()));
    for stemcell in &state.stemcells {
        ui::kv(
            &stemcell.id,
            &format!("{} ({}/{})", stemcell.cid, stemcell.name, stemcell.version),
        );
    }
}
