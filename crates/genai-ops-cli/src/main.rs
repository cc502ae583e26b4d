//! genai-ops - inspect resolved GenAI GPU infrastructure configuration
//!
//! ## Commands
//!
//! - `resolve`: Resolve one configuration directory and show every value
//! - `pools`: GPU node pools of the selected environment
//! - `models`: Model-to-hardware artifact mappings
//! - `tenancies`: Service tenancies of the selected realm
//! - `tenants`: Reconciled tenant registry
//! - `dataset`: Everything above in one document

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use genai_ops_core::metrics::METRICS;
use genai_ops_core::{
    extract_all_gpu_pools, extract_model_artifacts, extract_service_tenancies, CancellationToken,
    DatasetLoader, Environment, GpuPool, ModelArtifact, RepoLayout, ResolutionResult, Resolver,
    ServiceTenancy, Tenant, TenantCatalogSource, TenantReconciler, DEFAULT_MAX_ITERATIONS,
};
use serde::Serialize;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "genai-ops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve and inspect GenAI GPU infrastructure configuration", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(flatten)]
    target: Target,

    #[command(subcommand)]
    command: Commands,
}

/// Where the configuration lives and which environment to resolve.
#[derive(Args, Debug, Clone)]
struct Target {
    /// Root of the configuration repository
    #[arg(long, global = true, env = "GENAI_OPS_CONFIG_ROOT", default_value = ".")]
    config_root: PathBuf,

    /// Realm, e.g. oc1
    #[arg(long, global = true, env = "GENAI_OPS_REALM")]
    realm: Option<String>,

    /// Region, e.g. us-phoenix-1
    #[arg(long, global = true, env = "GENAI_OPS_REGION")]
    region: Option<String>,

    /// Environment type, e.g. dev, preprod, prod
    #[arg(long, global = true, env = "GENAI_OPS_ENV_TYPE")]
    env_type: Option<String>,

    /// Repository layout file (YAML); built-in defaults when omitted
    #[arg(long, global = true, env = "GENAI_OPS_LAYOUT")]
    layout: Option<PathBuf>,

    /// Upper bound on resolution passes
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
}

impl Target {
    fn environment(&self) -> Result<Environment> {
        let realm = self
            .realm
            .clone()
            .context("missing --realm (or GENAI_OPS_REALM)")?;
        let region = self
            .region
            .clone()
            .context("missing --region (or GENAI_OPS_REGION)")?;
        let env_type = self
            .env_type
            .clone()
            .context("missing --env-type (or GENAI_OPS_ENV_TYPE)")?;
        Ok(Environment::new(realm, region, env_type))
    }

    fn layout(&self) -> Result<RepoLayout> {
        RepoLayout::load_or_default(self.layout.as_deref()).context("Failed to load repository layout")
    }

    fn resolver(&self) -> Resolver {
        Resolver::new().with_max_iterations(self.max_iterations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a configuration directory and print every value
    Resolve {
        /// Directory of *.tf files
        dir: PathBuf,
    },

    /// List GPU node pools
    Pools,

    /// List model artifacts
    Models,

    /// List service tenancies of the selected realm
    Tenancies,

    /// List reconciled tenants
    Tenants,

    /// Assemble the full dataset
    Dataset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    genai_ops_core::telemetry::init_tracing(cli.json_logs, level);

    let result = run(&cli).await;
    METRICS.flush();
    result
}

async fn run(cli: &Cli) -> Result<()> {
    let target = &cli.target;
    let cancel = CancellationToken::new();
    match &cli.command {
        Commands::Resolve { dir } => cmd_resolve(target, dir, cli.format, &cancel),
        Commands::Pools => cmd_pools(target, cli.format, &cancel),
        Commands::Models => cmd_models(target, cli.format, &cancel),
        Commands::Tenancies => cmd_tenancies(target, cli.format, &cancel),
        Commands::Tenants => cmd_tenants(target, cli.format).await,
        Commands::Dataset => cmd_dataset(target, cli.format, &cancel).await,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn resolve_dir(
    target: &Target,
    env: &Environment,
    dir: &Path,
    cancel: &CancellationToken,
) -> Result<ResolutionResult> {
    target
        .resolver()
        .resolve_directory(dir, env, cancel)
        .with_context(|| format!("Failed to resolve {}", dir.display()))
}

/// Resolve a single directory
fn cmd_resolve(target: &Target, dir: &Path, format: Format, cancel: &CancellationToken) -> Result<()> {
    let env = target.environment()?;
    let result = resolve_dir(target, &env, dir, cancel)?;

    if format == Format::Json {
        return print_json(&result);
    }

    if let Some(fingerprint) = &result.fingerprint {
        println!(
            "Source: {} ({} files, {})",
            fingerprint.directory.display(),
            fingerprint.files,
            fingerprint.short()
        );
    }
    println!(
        "Resolved {} value(s) in {} pass(es)",
        result.values.len(),
        result.iterations
    );
    println!();
    for (name, value) in &result.values {
        println!("  {name} = {value}");
    }
    if !result.unresolved.is_empty() {
        println!();
        println!("Unresolved:");
        for diagnostic in &result.unresolved {
            println!("  {diagnostic}");
        }
    }
    Ok(())
}

fn print_pools(pools: &[GpuPool]) {
    if pools.is_empty() {
        println!("No GPU pools found");
        return;
    }
    println!(
        "{:<28} {:<22} {:>5} {:<12} {:<8} {}",
        "NAME", "SHAPE", "SIZE", "CAPACITY", "AD", "OKE"
    );
    for pool in pools {
        println!(
            "{:<28} {:<22} {:>5} {:<12} {:<8} {}",
            pool.name,
            pool.shape,
            pool.size,
            pool.capacity_type,
            pool.availability_domain,
            if pool.is_oke_managed { "yes" } else { "no" }
        );
    }
}

/// List GPU node pools
fn cmd_pools(target: &Target, format: Format, cancel: &CancellationToken) -> Result<()> {
    let env = target.environment()?;
    let layout = target.layout()?;
    let result = resolve_dir(target, &env, &layout.gpu_pools_dir(&target.config_root, &env), cancel)?;
    let pools = extract_all_gpu_pools(&result)?;
    match format {
        Format::Json => print_json(&pools),
        Format::Text => {
            print_pools(&pools);
            Ok(())
        }
    }
}

fn print_models(models: &[ModelArtifact]) {
    if models.is_empty() {
        println!("No model artifacts found");
        return;
    }
    println!(
        "{:<24} {:<12} {:<22} {:>4} {}",
        "MODEL", "TENSORRT", "SHAPE", "GPUS", "ARTIFACT"
    );
    for model in models {
        println!(
            "{:<24} {:<12} {:<22} {:>4} {}",
            model.model_name,
            model.tensorrt_version,
            model.gpu_shape,
            model.gpu_count,
            model.artifact_name
        );
    }
}

/// List model artifacts
fn cmd_models(target: &Target, format: Format, cancel: &CancellationToken) -> Result<()> {
    let env = target.environment()?;
    let layout = target.layout()?;
    let result = resolve_dir(
        target,
        &env,
        &layout.model_artifacts_dir(&target.config_root, &env),
        cancel,
    )?;
    let models = extract_model_artifacts(&result)?;
    match format {
        Format::Json => print_json(&models),
        Format::Text => {
            print_models(&models);
            Ok(())
        }
    }
}

fn print_tenancies(tenancies: &[ServiceTenancy]) {
    if tenancies.is_empty() {
        println!("No service tenancies found");
        return;
    }
    println!(
        "{:<6} {:<28} {:<18} {:<8} {}",
        "REALM", "NAME", "HOME REGION", "ENV", "REGIONS"
    );
    for tenancy in tenancies {
        println!(
            "{:<6} {:<28} {:<18} {:<8} {}",
            tenancy.realm,
            tenancy.name,
            tenancy.home_region,
            tenancy.environment,
            tenancy.regions.join(",")
        );
    }
}

/// List service tenancies of the selected realm
fn cmd_tenancies(target: &Target, format: Format, cancel: &CancellationToken) -> Result<()> {
    let env = target.environment()?;
    let layout = target.layout()?;
    let result = resolve_dir(
        target,
        &env,
        &layout.service_tenancies_dir(&target.config_root, &env),
        cancel,
    )?;
    let tenancies: Vec<ServiceTenancy> = extract_service_tenancies(&result)
        .into_iter()
        .filter(|t| t.realm == env.realm)
        .collect();
    match format {
        Format::Json => print_json(&tenancies),
        Format::Text => {
            print_tenancies(&tenancies);
            Ok(())
        }
    }
}

fn print_tenants(tenants: &[Tenant]) {
    if tenants.is_empty() {
        println!("No tenants found");
        return;
    }
    println!("{:<28} {:<9} {:<40} {}", "NAME", "INTERNAL", "IDS", "NOTE");
    for tenant in tenants {
        println!(
            "{:<28} {:<9} {:<40} {}",
            tenant.name,
            if tenant.is_internal { "yes" } else { "no" },
            tenant.ids.join(","),
            tenant.note
        );
    }
}

/// List reconciled tenants
async fn cmd_tenants(target: &Target, format: Format) -> Result<()> {
    let env = target.environment()?;
    let layout = target.layout()?;
    let overrides_root = layout.tenancy_overrides_root(&target.config_root, &env);
    let overrides = genai_ops_core::load_override_set(&overrides_root, &env.realm)
        .context("Failed to load tenancy overrides")?;
    let catalog = layout.catalog_source(&target.config_root, &env);
    let metadata = catalog
        .fetch()
        .await
        .with_context(|| format!("Failed to load tenant catalog {}", catalog.path().display()))?;

    let tenants = TenantReconciler::new().reconcile(&overrides, &metadata);
    match format {
        Format::Json => print_json(&tenants),
        Format::Text => {
            print_tenants(&tenants);
            Ok(())
        }
    }
}

/// Assemble the full dataset
async fn cmd_dataset(target: &Target, format: Format, cancel: &CancellationToken) -> Result<()> {
    let env = target.environment()?;
    let loader = DatasetLoader::new(&target.config_root, target.layout()?)
        .with_resolver(target.resolver());
    let dataset = loader
        .load(&env, cancel)
        .await
        .with_context(|| format!("Failed to load dataset for {env}"))?;

    if format == Format::Json {
        return print_json(&dataset);
    }

    println!("Environment: {}", dataset.environment);
    println!(
        "Loaded:      {}",
        dataset.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for fingerprint in &dataset.fingerprints {
        println!(
            "Source:      {} ({})",
            fingerprint.directory.display(),
            fingerprint.short()
        );
    }
    println!();
    print_pools(&dataset.gpu_pools);
    println!();
    print_models(&dataset.model_artifacts);
    println!();
    print_tenancies(&dataset.service_tenancies);
    println!();
    print_tenants(&dataset.tenants);
    if !dataset.diagnostics.is_empty() {
        println!();
        println!("Unresolved:");
        for diagnostic in &dataset.diagnostics {
            println!("  {diagnostic}");
        }
    }
    Ok(())
}
