use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use transit_hub::agencies::AgencyId;
use transit_hub::auth::{JwtService, Role};
use transit_hub::config::AppConfig;
use transit_hub::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Transit Hub",
    about = "Run the transit agency onboarding service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Mint a bearer token signed with the configured secret
    Token(TokenArgs),
    /// Walk an agency through onboarding against an in-memory store
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct TokenArgs {
    /// Role carried by the token: system_admin, agency_admin or station_manager
    #[arg(long)]
    pub(crate) role: Role,
    /// Agency the token is bound to (required for agency-scoped roles)
    #[arg(long)]
    pub(crate) agency_id: Option<AgencyId>,
    /// Subject claim recorded in the token
    #[arg(long, default_value = "cli")]
    pub(crate) subject: String,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Token(args) => mint_token(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn mint_token(args: TokenArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let tokens = JwtService::from_config(&config.auth);
    let token = tokens.create_token(&args.subject, args.role, args.agency_id)?;
    println!("{token}");
    Ok(())
}
