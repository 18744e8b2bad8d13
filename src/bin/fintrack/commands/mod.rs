//! One function per top level command.

use fintrack::Error;

use crate::{args::Command, context::Context};

mod ledger;
mod report;
mod system;
mod user;

pub fn dispatch(context: &mut Context, command: Command) -> Result<(), Error> {
    match command {
        // Runs before logging in, see `main`.
        Command::Init { .. } => Ok(()),
        Command::User(command) => user::run(context, command),
        Command::Passwd => user::change_password(context),
        Command::Account(command) => ledger::account(context, command),
        Command::Category(command) => ledger::category(context, command),
        Command::Transaction(command) => ledger::transaction(context, command),
        Command::Report(command) => report::run(context, command),
        Command::Config(command) => system::config(context, command),
        Command::Prefs(command) => system::prefs(context, command),
        Command::Backup(command) => system::backup(context, command),
        Command::Log(command) => system::log(context, command),
    }
}
