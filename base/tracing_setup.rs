// This file is part of Moonfire NVR, a security camera network video recorder.
// Copyright (C) 2023 The Moonfire NVR Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later WITH GPL-3.0-linking-exception.

//! Logic for setting up a `tracing` subscriber according to our preferences.

use tracing::error;
use tracing_subscriber::{fmt::time::FormatTime, layer::SubscriberExt, Layer};

struct ChronoTimer;

impl FormatTime for ChronoTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
        write!(w, "{}", chrono::Local::now().format(TIME_FORMAT))
    }
}

/// Custom panic hook that logs instead of directly writing to stderr.
fn panic_hook(p: &std::panic::PanicHookInfo) {
    let payload: Option<&str> = if let Some(s) = p.payload().downcast_ref::<&str>() {
        Some(*s)
    } else if let Some(s) = p.payload().downcast_ref::<String>() {
        Some(s)
    } else {
        None
    };
    error!(
        location = p.location().map(tracing::field::display),
        payload = payload.map(tracing::field::display),
        backtrace = %std::backtrace::Backtrace::force_capture(),
        "panic",
    );
}

/// Installs a global `tracing` subscriber reading filter directives from the
/// `CAMERA_PIPELINE_LOG` environment variable (defaulting to `info`), and a
/// panic hook that logs panics with a timestamp rather than writing bare to
/// stderr.
pub fn install() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .with_env_var("CAMERA_PIPELINE_LOG")
        .from_env_lossy();
    tracing_log::LogTracer::init().ok();

    let json = matches!(std::env::var("CAMERA_PIPELINE_LOG_FORMAT"), Ok(s) if s == "json");
    if json {
        let sub = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .json()
                .with_filter(filter),
        );
        tracing::subscriber::set_global_default(sub).ok();
    } else {
        let sub = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_timer(ChronoTimer)
                .with_thread_names(true)
                .with_filter(filter),
        );
        tracing::subscriber::set_global_default(sub).ok();
    }

    let use_panic_hook = std::env::var("CAMERA_PIPELINE_PANIC_HOOK")
        .map(|s| s != "false" && s != "0")
        .unwrap_or(true);
    if use_panic_hook {
        std::panic::set_hook(Box::new(&panic_hook));
    }
}

pub fn install_for_tests() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
        .with_env_var("CAMERA_PIPELINE_LOG")
        .from_env_lossy();
    let sub = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::Layer::new()
            .with_test_writer()
            .with_timer(ChronoTimer)
            .with_thread_names(true)
            .with_filter(filter),
    );
    let _ = tracing::subscriber::set_global_default(sub);
}
