// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `laika serve`: delivery workers, the digest scheduler, the poll
//! scheduler, and the gateway, all stopped by one cancellation token.

use std::time::Duration;

use laika_config::LaikaConfig;
use laika_core::LaikaError;
use laika_delivery::{DigestScheduler, workers};
use laika_gateway::{AuthConfig, GatewayState, start_server};
use laika_storage::queries::queue;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::app::App;
use crate::shutdown;

pub async fn run_serve(config: LaikaConfig) -> Result<(), LaikaError> {
    info!("starting laika serve");
    let cancel = shutdown::install_signal_handler();
    let app = App::open(config, cancel.clone()).await?;
    let config = &app.config;

    let requeued = queue::requeue_stale(&app.db).await?;
    if requeued > 0 {
        info!(requeued, "stale deliveries returned to their queues");
    }

    let mut tasks = JoinSet::new();
    for worker in workers(
        &app.db,
        &app.sinks,
        &app.links,
        &config.email.no_reply_email,
        Duration::from_millis(config.delivery.worker_idle_ms),
    ) {
        tasks.spawn(worker.run(cancel.clone()));
    }

    if config.digest.enabled {
        let scheduler = DigestScheduler::new(app.digest.clone(), &config.digest.schedule)?;
        tasks.spawn(scheduler.run(cancel.clone()));
    } else {
        info!("digest scheduler disabled");
    }

    if config.polling.enabled {
        let poller = app.engine.poller().clone();
        let token = cancel.clone();
        tasks.spawn(async move { poller.run(token).await });
    } else {
        info!("poll scheduler disabled");
    }

    let outcome = if config.gateway.enabled {
        let state = GatewayState::new(
            app.engine.clone(),
            app.launchpad.clone(),
            app.hub.clone(),
            AuthConfig::from_config(&config.gateway),
        );
        let served = start_server(&config.gateway, state, cancel.clone()).await;
        if let Err(e) = &served {
            error!(error = %e, "gateway stopped");
        }
        // A gateway that fails to bind takes the rest of the service down.
        cancel.cancel();
        served
    } else {
        info!("gateway disabled, running background tasks only");
        cancel.cancelled().await;
        Ok(())
    };

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "background task ended abnormally");
        }
    }

    app.db.close().await?;
    info!("laika stopped");
    outcome
}
