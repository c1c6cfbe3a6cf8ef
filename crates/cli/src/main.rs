use std::sync::Arc;

use anyhow::Context;
use chart_core::{
    config_from_env_values, AllergyForm, AllergyInput, CancellationToken, ChartClient,
    ChartServices, EnvValues, Outcome,
};
use chart_types::ResourceId;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "chart")]
#[command(about = "Patient chart CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a patient's allergies, most recently updated first
    ListAllergies {
        /// Patient identifier
        patient: String,
    },
    /// Show one allergy, normalised
    GetAllergy {
        /// Allergy identifier
        allergy: String,
    },
    /// Show one of a patient's allergies in the backend representation
    GetPatientAllergy {
        /// Patient identifier
        patient: String,
        /// Allergy identifier
        allergy: String,
    },
    /// List the members of an allergen concept set
    AllergenMembers {
        /// Concept set identifier
        concept: String,
    },
    /// List the reactions offered on the allergy form
    Reactions,
    /// Record a new allergy
    CreateAllergy {
        /// Patient identifier
        patient: String,
        #[command(flatten)]
        form: FormArgs,
    },
    /// Replace an existing allergy
    UpdateAllergy {
        /// Patient identifier
        patient: String,
        /// Allergy identifier
        allergy: String,
        #[command(flatten)]
        form: FormArgs,
    },
    /// Delete an allergy
    DeleteAllergy {
        /// Patient identifier
        patient: String,
        /// Allergy identifier
        allergy: String,
    },
    /// Search visit types by name
    VisitTypes {
        /// Search term (matches anywhere in the name, ignoring case)
        #[arg(long, default_value = "")]
        query: String,
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// List a patient's program enrollments
    Programs {
        /// Patient identifier
        patient: String,
    },
    /// Show the backend session of the configured user
    Session,
}

#[derive(Args)]
struct FormArgs {
    /// DRUG, FOOD, ENVIRONMENT or OTHER
    #[arg(long)]
    allergen_type: String,
    /// Coded allergen concept identifier
    #[arg(long)]
    allergen: String,
    /// Severity concept identifier
    #[arg(long)]
    severity: String,
    #[arg(long)]
    comment: Option<String>,
    /// Reaction concept identifier (repeatable)
    #[arg(long = "reaction")]
    reactions: Vec<String>,
}

impl FormArgs {
    fn into_input(self) -> anyhow::Result<AllergyInput> {
        let form = AllergyForm {
            allergen_type: self.allergen_type,
            coded_allergen_uuid: self.allergen,
            severity_uuid: self.severity,
            comment: self.comment,
            reaction_uuids: self.reactions,
        };
        Ok(AllergyInput::try_from(form)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = config_from_env_values(EnvValues::from_env()).context("invalid configuration")?;
    let services = ChartServices::new(ChartClient::connect(Arc::new(cfg))?);

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    run(cli.command, &services, &token).await
}

async fn run(
    command: Commands,
    services: &ChartServices,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let allergies = &services.allergies;

    match command {
        Commands::ListAllergies { patient } => {
            let listing = match allergies.list_allergies(&id(&patient)?, token).await {
                Outcome::Completed(listing) => listing,
                Outcome::Cancelled => return cancelled(),
            };
            if let Some(err) = listing.error {
                anyhow::bail!("failed to list allergies: {err}");
            }
            match listing.records {
                Some(records) => print_json(&records),
                None => {
                    println!("No allergies recorded.");
                    Ok(())
                }
            }
        }
        Commands::GetAllergy { allergy } => {
            print_outcome(allergies.get_allergy(&id(&allergy)?, token).await?)
        }
        Commands::GetPatientAllergy { patient, allergy } => print_outcome(
            allergies
                .get_patient_allergy(&id(&patient)?, &id(&allergy)?, token)
                .await?,
        ),
        Commands::AllergenMembers { concept } => print_outcome(
            allergies
                .allergen_concept_members(&id(&concept)?, token)
                .await?,
        ),
        Commands::Reactions => print_outcome(allergies.reaction_concepts(token).await?),
        Commands::CreateAllergy { patient, form } => {
            let input = form.into_input()?;
            print_outcome(
                allergies
                    .create_allergy(&input, &id(&patient)?, token)
                    .await?,
            )
        }
        Commands::UpdateAllergy {
            patient,
            allergy,
            form,
        } => {
            let input = form.into_input()?;
            print_outcome(
                allergies
                    .update_allergy(&input, &id(&patient)?, &id(&allergy)?, token)
                    .await?,
            )
        }
        Commands::DeleteAllergy { patient, allergy } => {
            match allergies
                .delete_allergy(&id(&patient)?, &id(&allergy)?, token)
                .await?
            {
                Outcome::Completed(()) => {
                    println!("Deleted allergy {allergy}");
                    Ok(())
                }
                Outcome::Cancelled => cancelled(),
            }
        }
        Commands::VisitTypes { query, page } => {
            print_outcome(services.visit_types.search(&query, page, token).await?)
        }
        Commands::Programs { patient } => print_outcome(
            services
                .programs
                .patient_programs(&id(&patient)?, token)
                .await?,
        ),
        Commands::Session => print_outcome(services.session.current_session(token).await?),
    }
}

fn id(raw: &str) -> anyhow::Result<ResourceId> {
    ResourceId::new(raw).with_context(|| format!("invalid identifier '{raw}'"))
}

fn print_outcome<T: Serialize>(outcome: Outcome<T>) -> anyhow::Result<()> {
    match outcome {
        Outcome::Completed(value) => print_json(&value),
        Outcome::Cancelled => cancelled(),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cancelled() -> anyhow::Result<()> {
    anyhow::bail!("cancelled")
}
