use crate::error::AppError;
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Loads layered settings for a service.
///
/// Sources, lowest precedence first: `<config_dir>/base.yaml` (optional),
/// `APP_`-prefixed environment variables using `__` as the nesting
/// separator (`APP_SERVER__PORT=8080`), then `overrides`, which map a
/// settings key to a plain environment variable name and only apply when
/// that variable is set.
pub fn load_settings<T: DeserializeOwned>(
    config_dir: &Path,
    overrides: &[(&str, &str)],
) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let mut builder = Config::builder()
        .add_source(File::from(config_dir.join("base.yaml")).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        );

    for (key, variable) in overrides {
        builder = builder.set_override_option(*key, std::env::var(variable).ok())?;
    }

    Ok(builder.build()?.try_deserialize()?)
}
