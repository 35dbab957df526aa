//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire configuration, logging, storage and the model registry the way a
//!   host service would at startup.
//! - Print the registered models and their fields for quick local checks.

use log::error;
use schemakit_core::{
    core_version, init_logging, open_db, open_db_in_memory, CoreConfig, DocumentQuery,
    DocumentStore, FieldDef, ModelRegistry, SqliteDocumentStore,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("schemakit: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    init_logging(config.log_level, config.log_dir.as_deref())?;

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let store = SqliteDocumentStore::try_new(&conn)?;

    let mut registry = ModelRegistry::new();
    if let Some(dir) = &config.model_dir {
        registry.load_model_dir(dir)?;
    }

    println!("schemakit_core version={}", core_version());
    for name in registry.names() {
        let model = registry.require(&name)?;
        let count = store.count(&model, &DocumentQuery::new())?;
        println!("model={name} documents={count}");
        for (field, def) in model.schema().definition() {
            println!("  {field}: {}", describe(def));
        }
    }

    Ok(())
}

fn describe(def: &FieldDef) -> String {
    match def {
        FieldDef::Scalar(descriptor) => {
            let mut text = descriptor.kind.to_string();
            if descriptor.required {
                text.push_str(" required");
            }
            if descriptor.is_private() {
                text.push_str(" private");
            }
            text
        }
        FieldDef::Array(inner) => format!("[{}]", describe(inner)),
        FieldDef::Nested(definition) => format!("{{{} fields}}", definition.len()),
    }
}
