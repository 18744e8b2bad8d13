use fintrack::{
    Error, Role, User,
    auth::Registration,
    permission::Grant,
    user::{UserFilter, UserUpdate, get_user_by_username},
};

use crate::{
    args::{GrantArgs, UserCommand},
    context::Context,
    output::{format_timestamp, new_password_pair, or_dash, print_table, read_password},
};

pub fn run(context: &mut Context, command: UserCommand) -> Result<(), Error> {
    match command {
        UserCommand::Add {
            username,
            fullname,
            email,
            role,
        } => {
            context.session.require_role(Role::Admin)?;
            let (password, confirm_password) =
                new_password_pair(&format!("Password for {username}"))?;

            let registration = Registration {
                username,
                password,
                confirm_password,
                fullname,
                email,
                role,
            };
            let user = context
                .session
                .register(&registration, None, context.now, &context.connection)?;

            context.emit(&user, |user| {
                println!("Created {} \"{}\" with ID {}.", user.role, user.username, user.id)
            })
        }
        UserCommand::List { role, status } => {
            let users = context
                .session
                .list_users(UserFilter { role, status }, &context.connection)?;

            context.emit(&users, |users| print_users(users))
        }
        UserCommand::Show { username } => {
            let user = find_user(context, &username)?;
            let user = context.session.get_user(user.id, &context.connection)?;

            context.emit(&user, |user| print_user(user))
        }
        UserCommand::Update {
            username,
            fullname,
            email,
            role,
            status,
        } => {
            let user = find_user(context, &username)?;
            let update = UserUpdate {
                fullname,
                email,
                role,
                status,
            };

            context
                .session
                .update_user_info(user.id, &update, &context.connection)?;
            context.done(&format!("Updated \"{username}\"."))
        }
        UserCommand::Delete { username } => {
            let user = find_user(context, &username)?;
            context.session.delete_user(user.id, &context.connection)?;
            context.done(&format!("Deactivated \"{username}\"."))
        }
        UserCommand::ResetPassword { username } => {
            context.session.require_role(Role::Admin)?;
            let user = find_user(context, &username)?;
            let (password, confirm_password) = new_password_pair("New password")?;

            context.session.reset_password(
                user.id,
                &password,
                &confirm_password,
                &context.connection,
            )?;
            context.done(&format!("Reset the password for \"{username}\"."))
        }
        UserCommand::Unlock { username } => {
            let user = find_user(context, &username)?;
            context.session.unlock_user(user.id, &context.connection)?;
            context.done(&format!("Unlocked \"{username}\"."))
        }
        UserCommand::Grant(args) => {
            let grant = to_grant(context, &args)?;

            if context.session.grant_permission(&grant, &context.connection)? {
                context.done(&format!(
                    "Granted {} on {} {} to \"{}\".",
                    grant.permission, grant.resource_type, grant.resource_id, args.username
                ))
            } else {
                context.done(&format!("\"{}\" already has that permission.", args.username))
            }
        }
        UserCommand::Revoke(args) => {
            let grant = to_grant(context, &args)?;

            if context.session.revoke_permission(&grant, &context.connection)? {
                context.done(&format!(
                    "Revoked {} on {} {} from \"{}\".",
                    grant.permission, grant.resource_type, grant.resource_id, args.username
                ))
            } else {
                context.done(&format!("\"{}\" did not have that permission.", args.username))
            }
        }
        UserCommand::Permissions { username } => {
            let user = find_user(context, &username)?;
            let grants = context
                .session
                .get_user_permissions(user.id, &context.connection)?;

            context.emit(&grants, |grants| {
                let rows: Vec<_> = grants
                    .iter()
                    .map(|grant| {
                        [
                            grant.resource_type.to_string(),
                            grant.resource_id.to_string(),
                            grant.permission.to_string(),
                        ]
                    })
                    .collect();
                print_table(["Resource", "ID", "Permission"], &rows);
            })
        }
    }
}

pub fn change_password(context: &mut Context) -> Result<(), Error> {
    context.session.require_login()?;

    let old_password = std::env::var("FINTRACK_PASSWORD")
        .ok()
        .or_else(|| read_password("Current password: "))
        .ok_or(Error::EmptyPassword)?;
    let (new_password, confirm_password) = new_password_pair("New password")?;

    context.session.change_password(
        &old_password,
        &new_password,
        &confirm_password,
        &context.connection,
    )?;
    context.done("Password changed.")
}

fn find_user(context: &Context, username: &str) -> Result<User, Error> {
    context.session.require_login()?;

    get_user_by_username(username, &context.connection)
}

fn to_grant(context: &Context, args: &GrantArgs) -> Result<Grant, Error> {
    let user = find_user(context, &args.username)?;

    Ok(Grant {
        user_id: user.id,
        resource_type: args.resource_type,
        resource_id: args.resource_id,
        permission: args.permission,
    })
}

fn print_users(users: &[User]) {
    let rows: Vec<_> = users
        .iter()
        .map(|user| {
            [
                user.id.to_string(),
                user.username.clone(),
                user.fullname.clone(),
                user.role.to_string(),
                user.status.to_string(),
                or_dash(user.last_login.map(format_timestamp)),
            ]
        })
        .collect();

    print_table(
        ["ID", "Username", "Full name", "Role", "Status", "Last log-in"],
        &rows,
    );
}

fn print_user(user: &User) {
    println!("ID:              {}", user.id);
    println!("Username:        {}", user.username);
    println!("Full name:       {}", user.fullname);
    println!("Email:           {}", or_dash(user.email.as_deref()));
    println!("Role:            {}", user.role);
    println!("Status:          {}", user.status);
    println!("Created:         {}", format_timestamp(user.created_at));
    println!("Last log-in:     {}", or_dash(user.last_login.map(format_timestamp)));
    println!("Failed log-ins:  {}", user.failed_login_attempts);
}
