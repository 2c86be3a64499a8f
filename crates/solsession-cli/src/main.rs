//! solsession - command-line front end for the Sol Solution session manager.
//!
//! Logs in against the configured backend, keeps the session on disk between
//! runs and renews it transparently on the next command.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use solsession_core::{
    AdminGuard, ApiClient, AuthGuard, Config, CredentialStore, FileStore, Guard, Navigator, Role,
    RequestAugmenter, SessionManager, SessionStore, Surface,
};

/// Log file name in the cache directory
const LOG_FILE: &str = "solsession.log";

const USAGE: &str = "\
Usage: solsession <command>

Commands:
  login <email> [--remember]     Log in with a password
  login-code <email> <code>      Log in with a one-time access code
  request-code <email>           Email a one-time access code
  status                         Show the current session (renews if expired)
  guard <user|admin>             Evaluate a navigation guard
  logout [--forget]              End the session
  forgot-password <email>        Request a password reset email
  reset-password <token>         Set a new password with a reset token
  register <name> <email>        Create an account
  users                          List users (admin or manager)
  actions [--mine]               Show the activity log (all users needs admin or manager)";

/// Prints redirects instead of navigating
struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, surface: Surface) {
        println!("-> redirect to {}", surface.path());
    }
}

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(cache_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::fs::create_dir_all(cache_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(cache_dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(format!("{}: ", label)).context("Failed to read password")
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    match args.get(index) {
        Some(value) => Ok(value.as_str()),
        None => bail!("missing <{}>\n\n{}", name, USAGE),
    }
}

fn print_session(session: &SessionManager) {
    let roles = session.roles();
    println!("roles: {}", if roles.is_empty() { "-".to_string() } else { roles.join(", ") });
    match session.current_user() {
        Some(user) => println!(
            "user: {} <{}> ({}{})",
            user.display_name,
            user.email,
            user.role,
            if user.active { "" } else { ", inactive" }
        ),
        None => println!("user: -"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    let _log_guard = init_tracing(&config.cache_dir()?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };

    let file_store = Arc::new(FileStore::new(config.session_path()?));
    let store: Arc<dyn SessionStore> = file_store.clone();
    let api = ApiClient::new(&config, RequestAugmenter::new(store.clone()))?;
    let session = SessionManager::new(store, Arc::new(api.clone()));
    session.init();
    info!(api = api.base_url(), command, "solsession starting");

    match command {
        "login" => {
            let email = arg(&args, 1, "email")?;
            let remember = args.iter().any(|a| a == "--remember");
            let password = match CredentialStore::get_password(email) {
                Ok(password) if !remember => password,
                _ => prompt_password("Password")?,
            };
            session.login(email, &password).await?;
            if remember {
                if let Err(e) = CredentialStore::store(email, &password) {
                    warn!(error = %e, "Could not remember password");
                }
            }
            config.last_email = Some(email.to_string());
            config.save()?;
            println!("Logged in as {}", email);
            print_session(&session);
        }
        "login-code" => {
            let email = arg(&args, 1, "email")?;
            let code = arg(&args, 2, "code")?;
            session.login_with_code(email, code).await?;
            config.last_email = Some(email.to_string());
            config.save()?;
            println!("Logged in as {}", email);
            print_session(&session);
        }
        "request-code" => {
            let email = arg(&args, 1, "email")?;
            let ack = api.generate_access_code(email).await?;
            println!("{}", ack.message.as_deref().unwrap_or("Access code sent"));
        }
        "status" => {
            if session.is_authenticated().await {
                println!("authenticated");
                print_session(&session);
            } else {
                println!("not authenticated");
            }
            println!("session file: {}", file_store.path().display());
            if let Some(ref email) = config.last_email {
                if CredentialStore::has_credentials(email) {
                    println!("remembered login: {}", email);
                }
            }
        }
        "guard" => {
            let navigator = Arc::new(ConsoleNavigator);
            let allowed = match arg(&args, 1, "user|admin")? {
                "user" => {
                    AuthGuard::new(session.clone(), navigator)
                        .can_activate(&Role::ALL)
                        .await
                }
                "admin" => {
                    AdminGuard::new(session.clone(), navigator)
                        .can_activate(&[Role::Admin, Role::Manager])
                        .await
                }
                other => bail!("unknown guard '{}'\n\n{}", other, USAGE),
            };
            println!("{}", if allowed { "allowed" } else { "denied" });
        }
        "logout" => {
            if let Err(e) = session.logout().await {
                warn!(error = %e, "Server-side logout failed; local session cleared anyway");
            }
            if args.iter().any(|a| a == "--forget") {
                if let Some(ref email) = config.last_email {
                    if let Err(e) = CredentialStore::delete(email) {
                        warn!(error = %e, "Could not forget remembered password");
                    }
                }
            }
            println!("Logged out");
        }
        "forgot-password" => {
            let email = arg(&args, 1, "email")?;
            let ack = api.request_password_reset(email).await?;
            println!("{}", ack.message.as_deref().unwrap_or("Reset email sent"));
        }
        "reset-password" => {
            let token = arg(&args, 1, "token")?;
            api.validate_reset_token(token)
                .await
                .context("Reset token is invalid or expired")?;
            let password = prompt_password("New password")?;
            let confirm = prompt_password("Confirm new password")?;
            if password != confirm {
                bail!("passwords do not match");
            }
            let ack = api.reset_password(token, &password).await?;
            println!("{}", ack.message.as_deref().unwrap_or("Password updated"));
        }
        "register" => {
            let name = arg(&args, 1, "name")?;
            let email = arg(&args, 2, "email")?;
            let password = prompt_password("Password")?;
            let role = match prompt("Role [USER]")?.as_str() {
                "" => None,
                other => Some(
                    Role::parse(other).with_context(|| format!("unknown role '{}'", other))?,
                ),
            };
            let ack = api.register(name, email, &password, role).await?;
            println!("{}", ack.message.as_deref().unwrap_or("Account created"));
        }
        "users" => {
            if !AdminGuard::new(session.clone(), Arc::new(ConsoleNavigator))
                .can_activate(&[Role::Admin, Role::Manager])
                .await
            {
                bail!("admin or manager role required");
            }
            for user in api.list_users().await? {
                println!(
                    "{:>5}  {:<8} {:<8} {} <{}>",
                    user.id,
                    user.role,
                    if user.active { "active" } else { "inactive" },
                    user.display_name,
                    user.email
                );
            }
        }
        "actions" => {
            let actions = if args.iter().any(|a| a == "--mine") {
                if !session.is_authenticated().await {
                    bail!("not logged in");
                }
                api.user_actions().await?
            } else {
                if !AdminGuard::new(session.clone(), Arc::new(ConsoleNavigator))
                    .can_activate(&[Role::Admin, Role::Manager])
                    .await
                {
                    bail!("admin or manager role required");
                }
                api.list_actions().await?
            };
            for action in actions {
                println!(
                    "{}  {:<12} {:<20} {}",
                    action.date_action.as_deref().unwrap_or("-"),
                    action.type_action,
                    action.user_name,
                    action.description
                );
            }
        }
        "help" | "--help" | "-h" => println!("{}", USAGE),
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }

    Ok(())
}
