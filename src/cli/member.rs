//! forum-kanban member command implementation

use crate::error::Result;
use crate::provision;

use super::project::{emit_provision, resolve_caller};
use super::{CallerArgs, GlobalOptions};

/// Options for `member add` and `member remove`
pub struct MemberOptions {
    pub project: String,
    pub target: String,
    pub caller: CallerArgs,
    pub remove: bool,
}

pub fn run(options: MemberOptions, globals: &GlobalOptions) -> Result<()> {
    let config = globals.load_config()?;
    let store = globals.store(&config);
    let platform = globals.platform(&config)?;
    let caller = resolve_caller(&platform, options.caller);

    if options.remove {
        let outcome =
            provision::remove_member(&store, &platform, &caller, &options.project, &options.target)?;
        emit_provision(globals, "member remove", &outcome)
    } else {
        let outcome =
            provision::add_member(&store, &platform, &caller, &options.project, &options.target)?;
        emit_provision(globals, "member add", &outcome)
    }
}
