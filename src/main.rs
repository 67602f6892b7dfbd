use castmod::app::Moderation;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    if handle_cli_flags() {
        return;
    }

    if let Err(err) = castmod::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

const HELP: &str = "Castmod — moderate your livestream platform from the terminal.

  --version, -V                 Show version and exit
  --help,    -h                 Show this help message
  --sign-in TOKEN               Save the API bearer token and exit
  --sign-out                    Remove the saved API bearer token and exit
  --roles                       List roles and exit
  --create-role NAME DESC       Create a role and exit
  --assign-role USER_ID ROLE    Assign a role to a user and exit
  --comment POST_ID TEXT USER   Post a comment and exit
  --delete-comment ID           Delete a comment and exit
  --delete-user ID              Delete a user and exit

Run without flags to print the dashboard snapshot.";

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Castmod {}", castmod::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                saw_flag = true;
            }
            "--sign-in" => {
                saw_flag = true;
                let token = expect_value(&mut iter, "--sign-in", "TOKEN");
                run_or_exit(with_store(|store| castmod::auth::sign_in(store, &token)));
                println!("Token saved.");
            }
            "--sign-out" => {
                saw_flag = true;
                run_or_exit(with_store(castmod::auth::sign_out));
                println!("Token removed.");
            }
            "--roles" => {
                saw_flag = true;
                run_or_exit(castmod::app::moderate(Moderation::ListRoles));
            }
            "--create-role" => {
                saw_flag = true;
                let name = expect_value(&mut iter, "--create-role", "NAME");
                let description = expect_value(&mut iter, "--create-role", "DESC");
                run_or_exit(castmod::app::moderate(Moderation::CreateRole {
                    name,
                    description,
                    permissions: Vec::new(),
                }));
            }
            "--assign-role" => {
                saw_flag = true;
                let user_id = expect_id(&mut iter, "--assign-role", "USER_ID");
                let role = expect_value(&mut iter, "--assign-role", "ROLE");
                run_or_exit(castmod::app::moderate(Moderation::AssignRole {
                    user_id,
                    role,
                }));
            }
            "--comment" => {
                saw_flag = true;
                let post_id = expect_value(&mut iter, "--comment", "POST_ID");
                let text = expect_value(&mut iter, "--comment", "TEXT");
                let user_id = expect_value(&mut iter, "--comment", "USER");
                run_or_exit(castmod::app::moderate(Moderation::PostComment {
                    post_id,
                    text,
                    user_id,
                }));
            }
            "--delete-comment" => {
                saw_flag = true;
                let id = expect_value(&mut iter, "--delete-comment", "ID");
                run_or_exit(castmod::app::moderate(Moderation::DeleteComment(id)));
            }
            "--delete-user" => {
                saw_flag = true;
                let id = expect_id(&mut iter, "--delete-user", "ID");
                run_or_exit(castmod::app::moderate(Moderation::DeleteUser(id)));
            }
            _ => {}
        }
    }
    saw_flag
}

fn expect_value(iter: &mut std::slice::Iter<'_, String>, flag: &str, name: &str) -> String {
    match iter.next() {
        Some(value) => value.clone(),
        None => {
            eprintln!("{flag} requires {name}");
            std::process::exit(2);
        }
    }
}

fn expect_id(iter: &mut std::slice::Iter<'_, String>, flag: &str, name: &str) -> i64 {
    let value = expect_value(iter, flag, name);
    match value.parse() {
        Ok(id) => id,
        Err(_) => {
            eprintln!("{flag}: {name} must be numeric, got {value:?}");
            std::process::exit(2);
        }
    }
}

fn run_or_exit(result: anyhow::Result<()>) {
    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn with_store<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce(&castmod::storage::Store) -> anyhow::Result<()>,
{
    let cfg = castmod::config::load(castmod::config::LoadOptions::default())?;
    let store = castmod::storage::Store::open(castmod::storage::Options {
        path: cfg.storage.path,
    })?;
    f(&store)
}
