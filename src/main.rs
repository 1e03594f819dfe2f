use std::sync::{Arc, RwLock};

use anyhow::bail;
use clap::Parser;

mod app;
mod auth;
mod cli;
mod config;
mod eid;
mod history;
mod insights;
mod podcasts;
mod sources;
mod users;
mod web;

#[cfg(test)]
mod tests;

use users::{Role, UserCreate, UserStore};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let base_path = config::resolve_base_path(args.base_path.clone());
    let config = Arc::new(RwLock::new(config::Config::load_with(&base_path)?));
    let secrets = config::Secrets::load(&base_path)?;

    match args.command {
        cli::Command::Daemon {} => {
            let app = app::App::new(config, secrets, &base_path)?;
            web::start_daemon(app);
            Ok(())
        }

        cli::Command::Fetch { url } => {
            let registry = sources::SourceRegistry::from_secrets(&secrets);
            match registry.fetch(&url) {
                Ok((source, meta)) => {
                    log::info!("resolved {} source {}", source.platform, source.external_id);
                    println!("{}", serde_json::to_string_pretty(&meta).unwrap());
                    Ok(())
                }
                Err(err) => bail!("fetch failed: {err}"),
            }
        }

        cli::Command::User { action } => match action {
            cli::UserAction::Add {
                email,
                username,
                admin,
            } => {
                let password = inquire::Password::new("password:").prompt()?;
                if password.len() < 8 {
                    bail!("password must be at least 8 characters");
                }

                let store = users::BackendJson::load(
                    &std::path::Path::new(&base_path).join("users.json"),
                )?;

                let salt = auth::generate_salt();
                let password_hash = auth::hash_password(&password, &salt);

                let user = store.create(UserCreate {
                    email,
                    username,
                    password_hash,
                    salt,
                    role: if admin { Role::Admin } else { Role::User },
                })?;

                println!(
                    "{}",
                    serde_json::to_string_pretty(&users::PublicUser::from(&user)).unwrap()
                );
                Ok(())
            }
        },
    }
}
