//! `wakili` entry point.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use wakili_client::agent::IcTransport;
use wakili_client::auth::{LoginPrompt, StoredDelegation};
use wakili_client::config::ClientConfig;
use wakili_client::error::ClientError;
use wakili_client::export;
use wakili_client::mediator::{Command, CommandOutcome, FormState, Mediator};
use wakili_client::page::PageState;
use wakili_client::session::{BootstrapState, Bootstrapper, Session};
use wakili_client::telemetry;
use wakili_core::{AuthError, ProviderKind};

#[derive(Parser, Debug)]
#[command(name = "wakili", version, about = "AI legal assistant client")]
struct Cli {
    /// Path to the TOML configuration (defaults to $WAKILI_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and show the dashboard.
    Login,

    /// Ask a legal question.
    Advice {
        prompt: String,
        #[arg(long)]
        context: Option<String>,
        #[arg(long, default_value_t = false)]
        confidential: bool,
    },

    /// Generate a legal document.
    Document {
        prompt: String,
        #[arg(long = "type")]
        document_type: String,
        #[arg(long)]
        context: Option<String>,
        #[arg(long, default_value_t = false)]
        confidential: bool,
        /// Write the generated document to the download directory.
        #[arg(long, default_value_t = false)]
        download: bool,
        /// Save the document to the account and refresh the list.
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// Show the user profile.
    Profile,

    /// List stored documents.
    Documents,

    /// Show one stored document.
    Show { id: String },

    /// Change the display name.
    Rename { name: String },

    /// List the devices registered for an identity anchor.
    Devices { anchor: u64 },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref())?;
    telemetry::init_logging(config.log_filter.as_deref()).map_err(ClientError::Logging)?;
    tracing::debug!(network = %config.network, host = %config.host(), "configuration loaded");

    let transport = Arc::new(IcTransport::new(
        config.host(),
        Duration::from_millis(config.request_timeout_ms),
    ));
    let page = Arc::new(PageState::new());
    let bootstrapper = Bootstrapper::from_config(&config, transport);

    let session = match establish(&bootstrapper, &page).await {
        Ok(session) => Arc::new(session),
        Err(err) => {
            print_page(&page);
            return Err(err.into());
        }
    };
    let mediator = Mediator::new(session.clone(), page.clone());

    let result = run_command(cli.command, &mediator, &config, &session).await;
    print_page(&page);
    result
}

async fn establish(bootstrapper: &Bootstrapper, page: &PageState) -> Result<Session, AuthError> {
    match bootstrapper.start(page).await? {
        BootstrapState::Ready(session) => Ok(session),
        BootstrapState::AwaitingLogin { provider } => {
            tracing::info!(%provider, "login required");
            bootstrapper.login(page, &TerminalPrompt).await
        }
    }
}

async fn run_command(
    command: Commands,
    mediator: &Mediator,
    config: &ClientConfig,
    session: &Session,
) -> Result<(), ClientError> {
    match command {
        Commands::Login => {
            mediator.load_dashboard().await;
            Ok(())
        }
        Commands::Advice {
            prompt,
            context,
            confidential,
        } => {
            let form = FormState {
                prompt,
                context,
                is_confidential: confidential,
                ..FormState::default()
            };
            finish(mediator.run(Command::GetAdvice, &form).await)
        }
        Commands::Document {
            prompt,
            document_type,
            context,
            confidential,
            download,
            save,
        } => {
            let form = FormState {
                prompt,
                document_type: Some(document_type),
                context,
                is_confidential: confidential,
                ..FormState::default()
            };
            finish(mediator.run(Command::GenerateDocument, &form).await)?;
            if download {
                let today = export::export_date(chrono::Utc::now());
                let path = mediator.download(&config.download_dir, today).await?;
                println!("Saved {}", path.display());
            }
            if save {
                finish(mediator.run(Command::SaveDocument, &form).await)?;
            }
            Ok(())
        }
        Commands::Profile => Ok(mediator.refresh_profile().await?),
        Commands::Documents => Ok(mediator.refresh_documents().await?),
        Commands::Show { id } => {
            let form = FormState {
                document_id: id,
                ..FormState::default()
            };
            finish(mediator.run(Command::ViewDocument, &form).await)
        }
        Commands::Rename { name } => {
            let form = FormState {
                name,
                ..FormState::default()
            };
            finish(mediator.run(Command::UpdateName, &form).await)
        }
        Commands::Devices { anchor } => {
            let devices = session.registry().lookup(anchor).await?;
            if devices.is_empty() {
                println!("No devices registered for anchor {}", anchor);
            }
            for device in devices {
                println!("{}  {}", device.alias, device.pubkey);
            }
            Ok(())
        }
    }
}

fn finish(outcome: CommandOutcome) -> Result<(), ClientError> {
    match outcome {
        CommandOutcome::Succeeded | CommandOutcome::Ignored => Ok(()),
        CommandOutcome::Rejected(err) => Err(err.into()),
        CommandOutcome::Failed(err) => Err(err.into()),
    }
}

fn print_page(page: &PageState) {
    print!("{}", page.snapshot().to_plain_text());
}

/// Interactive login over stdin/stdout.
struct TerminalPrompt;

impl TerminalPrompt {
    async fn ask(&self, provider: ProviderKind, question: &str) -> Result<String, AuthError> {
        let io_error = |e: std::io::Error| AuthError::LoginRejected {
            provider,
            reason: e.to_string(),
        };
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(question.as_bytes())
            .await
            .map_err(io_error)?;
        stdout.flush().await.map_err(io_error)?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(io_error)?;
        Ok(line.trim().to_string())
    }
}

#[async_trait]
impl LoginPrompt for TerminalPrompt {
    async fn confirm_wallet(&self, wallet: &str) -> Result<bool, AuthError> {
        let answer = self
            .ask(
                ProviderKind::Wallet,
                &format!("Connect {} to Wakili? [y/N] ", wallet),
            )
            .await?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    async fn obtain_delegation(&self, provider_url: &str) -> Result<StoredDelegation, AuthError> {
        let answer = self
            .ask(
                ProviderKind::DelegatedIdentity,
                &format!(
                    "Sign in at {} and paste the issued delegation JSON:\n",
                    provider_url
                ),
            )
            .await?;
        serde_json::from_str(&answer).map_err(|e| AuthError::LoginRejected {
            provider: ProviderKind::DelegatedIdentity,
            reason: format!("invalid delegation: {}", e),
        })
    }
}
