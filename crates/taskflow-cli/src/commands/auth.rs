use clap::Subcommand;
use taskflow_core::storage::secrets;
use taskflow_core::Config;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the API token in the OS keyring
    Login {
        /// Bearer token issued by the backend
        #[arg(long)]
        token: String,
        /// User id for the notification feed
        #[arg(long)]
        user_id: Option<String>,
        /// Display name
        #[arg(long)]
        user_name: Option<String>,
    },
    /// Remove the stored token
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Login {
            token,
            user_id,
            user_name,
        } => {
            let token = token.trim();
            if token.is_empty() {
                return Err("--token must not be empty".into());
            }
            secrets::store_api_token(token)?;
            if user_id.is_some() || user_name.is_some() {
                let mut config = Config::load()?;
                if let Some(id) = user_id {
                    config.auth.user_id = id;
                }
                if let Some(name) = user_name {
                    config.auth.user_name = name;
                }
                config.save()?;
            }
            println!("token stored");
        }
        AuthAction::Logout => {
            secrets::clear_api_token()?;
            println!("token removed");
        }
        AuthAction::Status => {
            let config = Config::load()?;
            let token = if std::env::var(secrets::TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty()) {
                format!("token from {}", secrets::TOKEN_ENV)
            } else if secrets::api_token().is_some() {
                "token in keyring".to_string()
            } else {
                "not authenticated".to_string()
            };
            println!("{token}");
            match config.auth.user_id() {
                Some(id) => println!("user: {id}"),
                None => println!("user: (not set)"),
            }
        }
    }
    Ok(())
}
