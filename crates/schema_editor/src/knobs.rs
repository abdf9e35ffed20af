//! Tunable limits and parameters for the schema editor.
//!
//! Every knob here should have a comment explaining what it's for and the
//! upper/lower bounds if applicable so an oncall engineer can adjust these
//! safely if needed.

use std::{
    collections::BTreeSet,
    str::FromStr,
    sync::LazyLock,
};

use cmd_util::env::env_config;

use crate::metadata::Engine;

/// Base URL of the DDL diff service, e.g. `https://bytebase.example.com`.
/// Empty means no service is configured.
pub static DDL_DIFF_SERVICE_URL: LazyLock<String> =
    LazyLock::new(|| env_config("DDL_DIFF_SERVICE_URL", String::new()));

/// Bearer token sent to the DDL diff service.
pub static DDL_DIFF_SERVICE_TOKEN: LazyLock<String> =
    LazyLock::new(|| env_config("DDL_DIFF_SERVICE_TOKEN", String::new()));

/// Whether the DDL diff service should take classifications from the
/// database config rather than from column comments.
pub static DDL_DIFF_CLASSIFICATION_FROM_CONFIG: LazyLock<bool> =
    LazyLock::new(|| env_config("DDL_DIFF_CLASSIFICATION_FROM_CONFIG", false));

/// Comma separated engines whose tables must declare a primary key before a
/// DDL diff is requested.
pub static SCHEMA_VALIDATOR_REQUIRE_PRIMARY_KEY: LazyLock<BTreeSet<Engine>> = LazyLock::new(|| {
    env_config(
        "SCHEMA_VALIDATOR_REQUIRE_PRIMARY_KEY",
        "MYSQL,TIDB,MARIADB,OCEANBASE".to_string(),
    )
    .split(',')
    .filter_map(|engine| Engine::from_str(engine.trim()).ok())
    .collect()
});
