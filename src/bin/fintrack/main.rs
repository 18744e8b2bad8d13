//! The `fintrack` command line client.

use std::{io, path::Path, process::ExitCode};

use clap::Parser;
use rusqlite::Connection;
use time::OffsetDateTime;

use fintrack::{
    AppConfig, Error, PasswordHash, PasswordPolicy, Role, Session, ValidatedPassword,
    backup::BackupManager,
    db::{ensure_admin_user, schema_version},
    initialize_db,
    logging::setup_logging,
    open_database,
    operation_log::{self, NewOperation},
    system_config::{self, ConfigValue},
    timezone::local_now,
    user::count_active_admins,
};

use crate::{
    args::{BackupCommand, Cli, Command},
    context::Context,
    output::{print_error, prompt_new_password},
};

mod args;
mod commands;
mod context;
mod output;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            print_error(error);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let mut config = AppConfig::load(&cli.config)?;

    if let Some(db_path) = &cli.db_path {
        config.database.path = db_path.clone();
    }

    config.validate()?;
    setup_logging(&config.logging)?;

    let now = local_now(&config.app.local_timezone)?;

    if let Command::Init { admin_username } = &cli.command {
        return init(&cli, &config, admin_username, now);
    }

    if !config.database.path.is_file() {
        return Err(Error::IoError(format!(
            "no database at {:?}, run `fintrack init` first",
            config.database.path
        )));
    }

    let connection = open_database(&config.database.path)?;

    if schema_version(&connection)? == 0 {
        return Err(Error::IoError(format!(
            "{:?} is not a fintrack database, run `fintrack init` first",
            config.database.path
        )));
    }

    let mut session = Session::new(config.security.bcrypt_cost);
    log_in(&cli, &mut session, now, &connection)?;

    if let Command::Backup(BackupCommand::Restore { path }) = &cli.command {
        return restore(&config, session, connection, path, now);
    }

    let mut context = Context {
        config,
        connection,
        session,
        now,
        json: cli.json,
    };

    let result = commands::dispatch(&mut context, cli.command);
    context.session.log_out(None, &context.connection);

    result
}

fn log_in(
    cli: &Cli,
    session: &mut Session,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let username = cli.username.as_deref().ok_or(Error::MissingCredentials)?;

    let password = match std::env::var("FINTRACK_PASSWORD") {
        Ok(password) => password,
        Err(_) => match rpassword::prompt_password(format!("Password for {username}: ")) {
            Ok(password) => password,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Error::MissingCredentials);
            }
            Err(error) => return Err(error.into()),
        },
    };

    let user = session.log_in(username, &password, None, now, connection)?;
    tracing::debug!("logged in as \"{}\" ({})", user.username, user.role);

    Ok(())
}

/// Create the database, write the config file if it is missing and make sure
/// there is an admin.
fn init(
    cli: &Cli,
    config: &AppConfig,
    admin_username: &str,
    now: OffsetDateTime,
) -> Result<(), Error> {
    let db_path = &config.database.path;

    if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    println!("Initializing database at {db_path:#?}");
    let connection = open_database(db_path)?;
    initialize_db(&connection)?;

    system_config::set_config(
        "security.password_min_length",
        &ConfigValue::Integer(config.security.password_min_length as i64),
        Some("Minimum password length"),
        &connection,
    )?;

    if !cli.config.exists() {
        config.save(&cli.config)?;
        println!("Wrote default config to {:#?}", cli.config);
    }

    if count_active_admins(&connection)? > 0 {
        println!("An active admin already exists, skipping admin creation.");
        return Ok(());
    }

    let policy = PasswordPolicy::from_system_config(&connection)?;

    let password = match std::env::var("FINTRACK_PASSWORD") {
        Ok(password) => ValidatedPassword::new(&password, &policy)?,
        Err(_) => match prompt_new_password(&format!("Password for {admin_username}"), &policy) {
            Some(password) => password,
            None => return Ok(()),
        },
    };

    let password_hash = PasswordHash::new(password, config.security.bcrypt_cost)?;

    if let Some(admin) = ensure_admin_user(admin_username, password_hash, now, &connection)? {
        operation_log::record(
            &NewOperation {
                user_id: Some(admin.id),
                action: "init",
                details: Some(&format!("created admin \"{}\"", admin.username)),
                target_table: Some("user"),
                ip_address: None,
            },
            &connection,
        );
        println!("Created admin user \"{}\".", admin.username);
    }

    Ok(())
}

/// Restoring replaces the database file, so the connection must be closed first
/// and a fresh one opened afterwards.
fn restore(
    config: &AppConfig,
    mut session: Session,
    connection: Connection,
    backup_path: &Path,
    now: OffsetDateTime,
) -> Result<(), Error> {
    let admin_id = session.require_role(Role::Admin)?.id;
    session.log_out(None, &connection);
    drop(connection);

    let manager = BackupManager::new(&config.database.path, &config.database.backup.folder);
    manager.restore_from_backup(backup_path, now)?;

    let connection = open_database(&config.database.path)?;
    operation_log::record(
        &NewOperation {
            user_id: Some(admin_id),
            action: "restore_backup",
            details: Some(&format!("restored {}", backup_path.display())),
            target_table: None,
            ip_address: None,
        },
        &connection,
    );

    println!("Restored the database from {backup_path:#?}.");

    Ok(())
}
