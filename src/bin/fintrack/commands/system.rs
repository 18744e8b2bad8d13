//! Settings, preferences, backups and the audit trail.

use std::{collections::BTreeMap, fs, path::PathBuf};

use serde_json::Value;

use fintrack::{
    Error, Role,
    backup::{BackupManager, format_size, is_backup_due, last_backup_time, record_backup_time},
    operation_log::{self, NewOperation, OperationLogFilter, get_operation_logs},
    preferences::{load_user_preferences, update_user_setting},
    system_config::{
        self, ConfigValue, delete_config, export_configs, get_config, get_configs_by_prefix,
        import_configs, set_config,
    },
    user::get_user_by_username,
};

use crate::{
    args::{BackupCommand, ConfigCommand, LogCommand, PrefsCommand},
    context::Context,
    output::{format_timestamp, or_dash, print_table},
};

pub fn config(context: &mut Context, command: ConfigCommand) -> Result<(), Error> {
    match command {
        ConfigCommand::Get { key } => {
            context.session.require_login()?;
            let value = get_config(&key, &context.connection)?.ok_or(Error::NotFound)?;

            context.emit(&value.to_json(), |_| {
                println!("{key} = {value} ({})", value.config_type())
            })
        }
        ConfigCommand::Set {
            key,
            value,
            config_type,
            description,
        } => {
            context.session.require_role(Role::Admin)?;

            let value = match config_type {
                Some(config_type) => ConfigValue::parse(&key, &value, config_type)?,
                None => ConfigValue::infer(&value),
            };
            set_config(&key, &value, description.as_deref(), &context.connection)?;
            audit(context, "update_config", &format!("{key} = {value}"));

            context.done(&format!("Set {key} to {value}."))
        }
        ConfigCommand::List { prefix } => {
            context.session.require_login()?;
            let configs = get_configs_by_prefix(&prefix, &context.connection)?;
            let object: BTreeMap<&String, Value> = configs
                .iter()
                .map(|(key, value)| (key, value.to_json()))
                .collect();

            context.emit(&object, |_| {
                let rows: Vec<_> = configs
                    .iter()
                    .map(|(key, value)| {
                        [key.clone(), value.config_type().to_string(), value.to_string()]
                    })
                    .collect();
                print_table(["Key", "Type", "Value"], &rows);
            })
        }
        ConfigCommand::Delete { key } => {
            context.session.require_role(Role::Admin)?;

            if !delete_config(&key, &context.connection)? {
                return Err(Error::NotFound);
            }

            audit(context, "delete_config", &key);
            context.done(&format!("Deleted {key}."))
        }
        ConfigCommand::Export { output } => {
            context.session.require_login()?;
            let json = export_configs(&context.connection)?;

            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    context.done(&format!("Exported settings to {}.", path.display()))
                }
                None => {
                    println!("{json}");
                    Ok(())
                }
            }
        }
        ConfigCommand::Import { file, overwrite } => {
            context.session.require_role(Role::Admin)?;
            let json = fs::read_to_string(&file)?;
            let written = import_configs(&json, overwrite, &context.connection)?;

            audit(
                context,
                "import_config",
                &format!("imported {written} settings from {}", file.display()),
            );
            context.done(&format!("Imported {written} settings."))
        }
    }
}

pub fn prefs(context: &mut Context, command: PrefsCommand) -> Result<(), Error> {
    let user_id = context.user_id()?;

    match command {
        PrefsCommand::Show => {
            let preferences = load_user_preferences(user_id, &context.connection)?;

            context.emit(&preferences, |preferences| {
                if preferences.is_empty() {
                    println!("(none)");
                }

                for (key, value) in preferences {
                    println!("{key} = {value}");
                }
            })
        }
        PrefsCommand::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));

            update_user_setting(user_id, &key, value, context.now, &context.connection)?;
            context.done(&format!("Saved {key}."))
        }
    }
}

pub fn backup(context: &mut Context, command: BackupCommand) -> Result<(), Error> {
    context.session.require_role(Role::Admin)?;

    let backup_config = &context.config.database.backup;
    let manager = BackupManager::new(&context.config.database.path, &backup_config.folder);

    match command {
        BackupCommand::Create { description } => {
            let path = create_backup(context, &manager, &description)?;
            context.done(&format!("Backed up the database to {}.", path.display()))
        }
        BackupCommand::List => {
            let backups = manager.list_backups()?;

            context.emit(&backups, |backups| {
                let rows: Vec<_> = backups
                    .iter()
                    .map(|backup| {
                        [
                            backup.file_name.clone(),
                            backup.description.clone(),
                            format_timestamp(backup.created_at),
                            format_size(backup.size),
                        ]
                    })
                    .collect();
                print_table(["File", "Description", "Created", "Size"], &rows);
            })
        }
        // Needs the connection closed, see `main`.
        BackupCommand::Restore { .. } => Ok(()),
        BackupCommand::Delete { path } => {
            if !manager.delete_backup(&path)? {
                return Err(Error::BackupNotFound(path));
            }

            audit(context, "delete_backup", &path.display().to_string());
            context.done(&format!("Deleted {}.", path.display()))
        }
        BackupCommand::Cleanup { days, keep_min } => {
            let days = days.unwrap_or(backup_config.keep_days);
            let keep_min = keep_min.unwrap_or(backup_config.min_keep);
            let deleted = manager.cleanup_old_backups(days, keep_min, context.now)?;

            context.done(&format!("Deleted {deleted} old backups."))
        }
        BackupCommand::Auto => {
            let enabled = system_config::get_bool_or(
                "backup.enabled",
                backup_config.enabled,
                &context.connection,
            )?;

            if !enabled {
                return context.done("Automatic backups are disabled.");
            }

            let interval_hours = match get_config("backup.interval_hours", &context.connection)? {
                Some(ConfigValue::Integer(hours)) => hours as f64,
                Some(ConfigValue::Float(hours)) => hours,
                _ => backup_config.interval_hours,
            };
            let last_backup_at = last_backup_time(&context.connection)?;

            if !is_backup_due(last_backup_at, interval_hours, context.now)? {
                return context.done("No backup is due.");
            }

            let path = create_backup(context, &manager, "auto")?;
            let deleted = manager.cleanup_old_backups(
                backup_config.keep_days,
                backup_config.min_keep,
                context.now,
            )?;

            context.done(&format!(
                "Backed up the database to {} and deleted {deleted} old backups.",
                path.display()
            ))
        }
    }
}

fn create_backup(
    context: &Context,
    manager: &BackupManager,
    description: &str,
) -> Result<PathBuf, Error> {
    let path = manager.create_backup(&context.connection, description, context.now)?;
    record_backup_time(context.now, &context.connection)?;
    audit(context, "create_backup", &path.display().to_string());

    Ok(path)
}

pub fn log(context: &mut Context, command: LogCommand) -> Result<(), Error> {
    context.session.require_role(Role::Admin)?;

    match command {
        LogCommand::List {
            user,
            action,
            limit,
        } => {
            let user_id = match user {
                Some(username) => Some(get_user_by_username(&username, &context.connection)?.id),
                None => None,
            };
            let logs = get_operation_logs(
                &OperationLogFilter {
                    user_id,
                    action,
                    limit: Some(limit),
                },
                &context.connection,
            )?;

            context.emit(&logs, |logs| {
                let rows: Vec<_> = logs
                    .iter()
                    .map(|log| {
                        [
                            format_timestamp(log.created_at),
                            or_dash(log.user_id),
                            log.action.clone(),
                            or_dash(log.target_table.as_deref()),
                            or_dash(log.details.as_deref()),
                        ]
                    })
                    .collect();
                print_table(["Time", "User", "Action", "Table", "Details"], &rows);
            })
        }
    }
}

fn audit(context: &Context, action: &str, details: &str) {
    operation_log::record(
        &NewOperation {
            user_id: context.session.current_user().map(|user| user.id),
            action,
            details: Some(details),
            target_table: action.ends_with("_config").then_some("system_config"),
            ip_address: None,
        },
        &context.connection,
    );
}
