//! `modstudio-sync` -- open a module, report wizard progress, and save it.
//!
//! Opens one module through the module-content service, logs the status of
//! every wizard step, saves any outstanding changes and optionally
//! duplicates the module under a new code.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                        | Description                         |
//! |------------------------|----------|--------------------------------|-------------------------------------|
//! | `MODULE_SERVICE_URL`   | no       | `http://localhost:4000/api/v1` | Module-content service base URL     |
//! | `MODULE_SERVICE_TOKEN` | no       | --                             | Bearer token; required for saving   |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`                           | HTTP request timeout                |
//! | `EDIT_DEBOUNCE_MS`     | no       | `500`                          | Quiescence window for text edits    |
//! | `COURSE_ID`            | yes      | --                             | Course owning the module            |
//! | `MODULE_CODE`          | yes      | --                             | Module to open                      |
//! | `DUPLICATE_TO`         | no       | --                             | Copy the module under this code     |

use std::sync::Arc;

use modstudio_core::wizard::WizardStepId;
use modstudio_sync::{DraftSession, StudioConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        tracing::error!("{name} environment variable is required");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modstudio_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StudioConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    let course_id = required_var("COURSE_ID");
    let module_code = required_var("MODULE_CODE");
    let duplicate_to = std::env::var("DUPLICATE_TO").ok().filter(|c| !c.is_empty());

    tracing::info!(
        service_url = %config.service_url,
        course_id = %course_id,
        module_code = %module_code,
        authorized = config.service_token.is_some(),
        "Starting modstudio-sync",
    );

    let client = config.http_client().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build HTTP client");
        std::process::exit(1);
    });

    let mut session = DraftSession::open(
        Arc::new(client),
        &course_id,
        &module_code,
        config.edit_debounce(),
    )
    .await
    .unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to open module");
        std::process::exit(1);
    });

    for step in WizardStepId::ALL {
        tracing::info!(
            step = step.to_number(),
            label = step.label(),
            status = ?session.step_status(step),
            "Wizard step",
        );
    }

    match session.save().await {
        Ok(report) => tracing::info!(
            calls = report.calls,
            report = %serde_json::to_string(&report).unwrap_or_default(),
            "Save finished",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Save failed");
            std::process::exit(1);
        }
    }

    if let Some(new_code) = duplicate_to {
        match session.duplicate(&new_code).await {
            Ok(result) => tracing::info!(
                new_code = %result.draft.module_code(),
                calls = result.report.calls,
                "Module duplicated",
            ),
            Err(e) => {
                tracing::error!(error = %e, "Duplicate failed");
                std::process::exit(1);
            }
        }
    }

    if let Some(handle) = session.close() {
        if let Ok(Err(failure)) = handle.await {
            tracing::error!(error = %failure, "Final save failed");
            std::process::exit(1);
        }
    }
}
