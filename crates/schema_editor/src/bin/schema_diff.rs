use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use anyhow::Context;
use clap::Parser;
use schema_editor::{
    catalog::DatabaseCatalog,
    diff_ddl::{
        DdlDiffServiceConfig,
        HttpDdlDiffService,
        StructuralValidator,
    },
    metadata::{
        DatabaseMetadata,
        Engine,
    },
    SchemaEditSession,
};
use serde::de::DeserializeOwned;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Classify the edits between a baseline schema and an edited copy"
)]
struct Args {
    /// JSON file holding the baseline `DatabaseMetadata`.
    #[arg(long)]
    baseline: PathBuf,

    /// JSON file holding the edited `DatabaseMetadata`.
    #[arg(long)]
    target: PathBuf,

    #[arg(long)]
    baseline_catalog: Option<PathBuf>,

    #[arg(long)]
    target_catalog: Option<PathBuf>,

    /// Print the edited tree with dropped objects removed instead of the
    /// edit statuses.
    #[arg(long)]
    apply: bool,

    /// Also ask the DDL diff service at this URL for the migration.
    #[arg(long, env = "DDL_DIFF_SERVICE_URL")]
    diff_service_url: Option<String>,

    #[arg(
        long,
        env = "DDL_DIFF_SERVICE_TOKEN",
        default_value = "",
        hide_env_values = true
    )]
    diff_service_token: String,

    /// SQL dialect of the database, e.g. MYSQL or POSTGRES.
    #[arg(long, default_value = "MYSQL")]
    engine: Engine,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_catalog(path: Option<&Path>) -> anyhow::Result<DatabaseCatalog> {
    path.map(read_json).transpose().map(Option::unwrap_or_default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = cmd_util::env::config_tool();
    let args = Args::parse();

    let baseline: DatabaseMetadata = read_json(&args.baseline)?;
    let target: DatabaseMetadata = read_json(&args.target)?;
    let baseline_catalog = read_catalog(args.baseline_catalog.as_deref())?;
    let target_catalog = read_catalog(args.target_catalog.as_deref())?;

    let database = if baseline.name.is_empty() {
        target.name.clone()
    } else {
        baseline.name.clone()
    };
    let session = SchemaEditSession::with_target(
        database,
        baseline,
        baseline_catalog,
        &target,
        &target_catalog,
    );

    if args.apply {
        println!("{}", serde_json::to_string_pretty(&session.applied_metadata())?);
    } else {
        for (key, status) in session.store().dirty_keys() {
            println!("{status}\t{key}");
        }
    }

    let Some(url) = args.diff_service_url.as_deref().filter(|url| !url.is_empty()) else {
        return Ok(());
    };
    let config = DdlDiffServiceConfig::from_parameters(url, &args.diff_service_token)?;
    let service = HttpDdlDiffService::new(config);
    let result = session
        .diff_ddl(&service, &StructuralValidator::default(), args.engine)
        .await;
    for error in &result.errors {
        eprintln!("{error}");
    }
    if !result.is_ok() {
        anyhow::bail!("DDL diff failed with {} errors", result.errors.len());
    }
    println!("{}", result.statement);
    Ok(())
}
