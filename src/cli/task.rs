//! forum-kanban task command implementation
//!
//! Runs one task command in a forum post thread.

use crate::error::Result;
use crate::fsm::{Invocation, TaskCommand, TaskFsm};
use crate::output::{emit_success, HumanOutput};

use super::{caller_roles, GlobalOptions, TaskCommands, ThreadArgs};

/// Options for the task commands
pub struct TaskOptions {
    pub command: TaskCommand,
    pub thread: ThreadArgs,
}

impl TaskOptions {
    pub fn from_command(cmd: TaskCommands) -> Self {
        let (command, thread) = match cmd {
            TaskCommands::Init(thread) => (TaskCommand::Init, thread),
            TaskCommands::Take(thread) => (TaskCommand::Take, thread),
            TaskCommands::Done {
                thread,
                description,
            } => (TaskCommand::Done { description }, thread),
            TaskCommands::Approve(thread) => (TaskCommand::Approve, thread),
            TaskCommands::Revoke(thread) => (TaskCommand::Revoke, thread),
            TaskCommands::Surrender(thread) => (TaskCommand::Surrender, thread),
        };
        Self { command, thread }
    }
}

pub fn run(options: TaskOptions, globals: &GlobalOptions) -> Result<()> {
    let config = globals.load_config()?;
    let store = globals.store(&config);
    let platform = globals.platform(&config)?;

    let caller = &options.thread.caller;
    let invocation = Invocation {
        guild_id: caller.guild.clone(),
        channel_id: options.thread.channel.clone(),
        caller_id: caller.user.clone(),
        caller_roles: caller_roles(&platform, &caller.guild, &caller.user, &caller.roles),
    };

    let command_name = format!("task {}", options.command.name().trim_start_matches("task-"));
    let fsm = TaskFsm::new(store, platform);
    let outcome = fsm.execute(&invocation, options.command)?;

    let human = HumanOutput::new(outcome.reply.clone());
    emit_success(globals.output, &command_name, &outcome, Some(&human))
}
