//! Shopdesk CLI - drive the commerce session layer from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Put two mugs in the cart
//! shopdesk cart add 42 --name "Mug" --price 12.90 --quantity 2
//!
//! # Sign in as a customer and check out
//! shopdesk login customer -e jane@example.fr -p hunter22
//! shopdesk checkout -e jane@example.fr --first-name Jane --last-name Doe \
//!     --line1 "1 rue de la Paix" --postal-code 75002 --city Paris
//!
//! # Back-office session, independent of the customer one
//! shopdesk login admin -e ops@example.fr -p secret
//! shopdesk whoami admin
//! ```
//!
//! Configuration comes from `SHOPDESK_*` environment variables (or `.env`);
//! state persists under `SHOPDESK_STATE_DIR`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use shopdesk_client::checkout::PaymentMethod;
use shopdesk_client::config::ClientConfig;
use shopdesk_client::ClientState;
use shopdesk_core::Audience;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "shopdesk")]
#[command(author, version, about = "Shopdesk commerce client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Sign in to one audience
    Login {
        /// `admin` or `customer`
        audience: Audience,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "SHOPDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out of one audience
    Logout {
        /// `admin` or `customer`
        audience: Audience,
    },
    /// Show the signed-in identity of one audience
    Whoami {
        /// `admin` or `customer`
        audience: Audience,
    },
    /// Submit the cart as an order
    Checkout(CheckoutArgs),
    /// Browse the customer's orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Manage the locale preference
    Locale {
        #[command(subcommand)]
        action: LocaleAction,
    },
    /// List product categories (admin session)
    Categories,
}

#[derive(Subcommand)]
enum CartAction {
    /// Add a product
    Add {
        /// Product id
        product_id: String,

        #[arg(short, long)]
        name: String,

        #[arg(long)]
        price: Decimal,

        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,

        #[arg(long)]
        slug: Option<String>,

        /// Size or other variant tag
        #[arg(long)]
        variant: Option<String>,
    },
    /// Show lines and totals
    List,
    /// Set the quantity of a line
    Update {
        product_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { product_id: String },
    /// Empty the cart
    Clear,
}

#[derive(clap::Args)]
struct CheckoutArgs {
    #[arg(short, long)]
    email: String,

    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    #[arg(long)]
    phone: Option<String>,

    #[arg(long)]
    line1: String,

    #[arg(long)]
    line2: Option<String>,

    #[arg(long)]
    postal_code: String,

    #[arg(long)]
    city: String,

    /// ISO country code
    #[arg(long, default_value = "FR")]
    country: String,

    #[arg(long)]
    notes: Option<String>,

    /// `cod`, `card`, `bank_transfer`, or any other tag the shop accepts
    #[arg(long, default_value = "cod")]
    payment: PaymentMethod,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders
    List {
        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Show one order
    Show { id: String },
}

#[derive(Subcommand)]
enum LocaleAction {
    /// Show the stored preference
    Show,
    /// Store a preference
    Set {
        locale: String,

        /// Also record it on the customer account
        #[arg(long)]
        remote: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln_error(&e);
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopdesk_client=info,shopdesk_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

#[allow(clippy::print_stderr)]
fn eprintln_error(error: &dyn std::error::Error) {
    eprintln!("shopdesk: {error}");
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let state = ClientState::from_config(config).await?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Add {
                product_id,
                name,
                price,
                quantity,
                slug,
                variant,
            } => {
                let product = commands::cart::product(&product_id, name, price, slug, variant);
                commands::cart::add(&state, product, quantity).await;
            }
            CartAction::List => commands::cart::list(&state).await,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(&state, &product_id, quantity).await,
            CartAction::Remove { product_id } => commands::cart::remove(&state, &product_id).await,
            CartAction::Clear => commands::cart::clear(&state).await,
        },
        Commands::Login {
            audience,
            email,
            password,
        } => commands::auth::login(&state, audience, &email, password).await?,
        Commands::Logout { audience } => commands::auth::logout(&state, audience).await,
        Commands::Whoami { audience } => commands::auth::whoami(&state, audience),
        Commands::Checkout(args) => {
            let form = commands::checkout::CheckoutInput {
                email: args.email,
                first_name: args.first_name,
                last_name: args.last_name,
                phone: args.phone,
                line1: args.line1,
                line2: args.line2,
                postal_code: args.postal_code,
                city: args.city,
                country: args.country,
                notes: args.notes,
                payment: args.payment,
            };
            commands::checkout::submit(&state, form).await?;
        }
        Commands::Orders { action } => match action {
            OrdersAction::List { page, per_page } => {
                commands::orders::list(&state, page, per_page).await?;
            }
            OrdersAction::Show { id } => commands::orders::show(&state, &id).await?,
        },
        Commands::Locale { action } => match action {
            LocaleAction::Show => commands::locale::show(&state),
            LocaleAction::Set { locale, remote } => {
                commands::locale::set(&state, &locale, remote).await?;
            }
        },
        Commands::Categories => commands::catalog::list(&state).await?,
    }
    Ok(())
}
