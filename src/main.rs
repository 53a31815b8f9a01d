use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use gallery_client::auth::RenderMode;
use gallery_client::config::{ClientConfig, ConfigError};
use gallery_client::models::cart::AddToCartData;
use gallery_client::models::notification::NotificationListParams;
use gallery_client::models::{LoginCredentials, RegisterData};
use gallery_client::navigation::MemoryNavigator;
use gallery_client::state::StartupError;
use gallery_client::{ActionError, ApiError, AppState};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("startup failed: {0}")]
    Startup(#[from] StartupError),
    #[error("{0}")]
    Action(#[from] ActionError),
    #[error("request failed: {0}")]
    Api(#[from] ApiError),
    #[error("not signed in; run `gallery login` first")]
    NotSignedIn,
    #[error("session expired; run `gallery login` again")]
    SessionExpired,
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "gallery", about = "Art gallery API client")]
struct Cli {
    #[arg(long, env = "GALLERY_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "GALLERY_STATE_DIR", default_value = ".gallery")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long, env = "GALLERY_PASSWORD")]
        password: String,
    },
    Register {
        email: String,
        #[arg(long, env = "GALLERY_PASSWORD")]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Exchange the stored refresh token for a new token pair.
    Refresh,
    /// GET an arbitrary API path with the stored session.
    Get { path: String },
    Notifications(NotificationArgs),
    Cart(CartCommand),
}

#[derive(Args, Debug)]
struct NotificationArgs {
    #[arg(long)]
    page: Option<u32>,
    #[arg(long, default_value_t = false)]
    unread: bool,
}

#[derive(Args, Debug)]
struct CartCommand {
    #[command(subcommand)]
    command: Option<CartSubcommand>,
}

#[derive(Subcommand, Debug)]
enum CartSubcommand {
    Show,
    Add {
        product_id: String,
        #[arg(long)]
        variant_id: Option<String>,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    Remove {
        item_id: String,
    },
    Clear,
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.base_url = ClientConfig::new(url)?.base_url;
    }
    config.state_dir = Some(cli.state_dir);

    let navigator = Arc::new(MemoryNavigator::new("/"));
    let state = AppState::connect(&config, navigator.clone())?;
    state.bootstrap.run(RenderMode::Client, &state.credentials).await;

    let result = run(&state, cli.command).await;
    if navigator.last().is_some_and(|to| to.query_value("expired").is_some()) {
        return Err(CliError::SessionExpired);
    }
    result
}

async fn run(state: &AppState, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { email, password } => {
            state.login(&LoginCredentials::new(email, password)).await?;
            println!("signed in as {}", state.credentials.full_name());
            Ok(())
        }
        Command::Register { email, password, first_name, last_name } => {
            let data = RegisterData { email, password, first_name, last_name };
            state.register(&data).await?;
            println!("registered {}", state.credentials.full_name());
            Ok(())
        }
        Command::Logout => {
            state.credentials.logout().await;
            println!("signed out");
            Ok(())
        }
        Command::Whoami => {
            require_session(state)?;
            let user = state.credentials.user().ok_or(CliError::NotSignedIn)?;
            print_json(&user)
        }
        Command::Refresh => {
            require_session(state)?;
            if !state.credentials.refresh_access_token().await {
                return Err(CliError::SessionExpired);
            }
            println!("token refreshed");
            Ok(())
        }
        Command::Get { path } => {
            let body: Value = state.api.get(&path).await?;
            print_json(&body)
        }
        Command::Notifications(args) => {
            require_session(state)?;
            let params = NotificationListParams {
                page: args.page,
                read: args.unread.then_some(false),
                ..NotificationListParams::default()
            };
            let page = state.notifications.fetch(&params).await?;
            print_json(&page)
        }
        Command::Cart(cart) => run_cart(state, cart.command.unwrap_or(CartSubcommand::Show)).await,
    }
}

async fn run_cart(state: &AppState, command: CartSubcommand) -> Result<(), CliError> {
    match command {
        CartSubcommand::Show => state.cart.fetch().await,
        CartSubcommand::Add { product_id, variant_id, quantity } => {
            let data = AddToCartData { product_id, variant_id, quantity: Some(quantity) };
            state.cart.add_item(&data).await?;
        }
        CartSubcommand::Remove { item_id } => {
            state.cart.fetch().await;
            state.cart.remove_item(&item_id).await?;
        }
        CartSubcommand::Clear => {
            state.cart.clear().await?;
            println!("cart cleared");
            return Ok(());
        }
        CartSubcommand::Validate => {
            let result = state.cart.validate().await?;
            return print_json(&result);
        }
    }
    match state.cart.snapshot().cart {
        Some(cart) => print_json(&cart),
        None => {
            println!("cart is empty");
            Ok(())
        }
    }
}

fn require_session(state: &AppState) -> Result<(), CliError> {
    if state.credentials.is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotSignedIn)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
