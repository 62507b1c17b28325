//! forum-kanban forum command implementation

use crate::error::Result;
use crate::provision;

use super::project::{emit_provision, resolve_caller};
use super::{CallerArgs, GlobalOptions};

pub struct CreateOptions {
    pub project: String,
    pub name: String,
    pub caller: CallerArgs,
}

pub struct DeleteOptions {
    pub project: String,
    pub forum: String,
    pub caller: CallerArgs,
}

pub fn run_create(options: CreateOptions, globals: &GlobalOptions) -> Result<()> {
    let config = globals.load_config()?;
    let store = globals.store(&config);
    let platform = globals.platform(&config)?;
    let caller = resolve_caller(&platform, options.caller);

    let outcome =
        provision::create_forum(&store, &platform, &caller, &options.project, &options.name)?;
    emit_provision(globals, "forum create", &outcome)
}

pub fn run_delete(options: DeleteOptions, globals: &GlobalOptions) -> Result<()> {
    let config = globals.load_config()?;
    let store = globals.store(&config);
    let platform = globals.platform(&config)?;
    let caller = resolve_caller(&platform, options.caller);

    let outcome =
        provision::delete_forum(&store, &platform, &caller, &options.project, &options.forum)?;
    emit_provision(globals, "forum delete", &outcome)
}
