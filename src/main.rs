use clap::Parser;
use filterlab::core::export::export_config;
use filterlab::core::import::{with_filter, with_input, ImportMode};
use filterlab::core::{Session, SessionStore};
use filterlab::utils::error::{ErrorSeverity, LabError, Result};
use filterlab::utils::{logger, validation::Validate};
use filterlab::{
    build_backend, restore_session, CliConfig, Command, ExecutionController, FileSessionStore,
    FilterEngine, LocalStorage, LogFormat, RunReport, TomlConfig,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

type Store = FileSessionStore<LocalStorage>;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 載入並驗證配置
    let config = match cli.resolve().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let store = FileSessionStore::new(LocalStorage::new(&config.session.state_dir));

    let result = match cli.command {
        Command::Run { input, filter } => {
            run_once(&config, store, input.as_deref(), filter.as_deref()).await
        }
        Command::Watch {
            input,
            filter,
            poll_ms,
            ..
        } => watch(&config, store, &input, &filter, Duration::from_millis(poll_ms)).await,
        Command::Import { input, raw, filter } => {
            import(&store, input.as_deref(), raw, filter.as_deref()).await
        }
        Command::Export { filter, out } => {
            export(&config, &store, filter.as_deref(), &out).await
        }
        Command::Reset => reset(&store).await,
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ filterlab failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(LabError::IoError)
}

async fn read_session(input: &Path, filter: &Path) -> Result<Session> {
    Ok(Session::new(read_text(input).await?, read_text(filter).await?))
}

fn print_report(report: &RunReport) {
    let rendered = report.render();
    if !rendered.is_empty() {
        println!("{}", rendered);
    }
    if !report.parse_errors.is_empty() || !report.record_errors.is_empty() {
        tracing::warn!(
            "⚠️ {} invalid input lines, {} failed events",
            report.parse_errors.len(),
            report.record_errors.len()
        );
    }
}

async fn run_once(
    config: &TomlConfig,
    store: Store,
    input: Option<&Path>,
    filter: Option<&Path>,
) -> Result<()> {
    let mut session = restore_session(&store).await;
    if let Some(path) = input {
        session.input = read_text(path).await?;
    }
    if let Some(path) = filter {
        session.filter = read_text(path).await?;
    }

    let engine = FilterEngine::new(build_backend(config)?, store);
    let report = engine.run(&session).await?;
    print_report(&report);
    Ok(())
}

async fn watch(
    config: &TomlConfig,
    store: Store,
    input: &Path,
    filter: &Path,
    poll_interval: Duration,
) -> Result<()> {
    let engine = Arc::new(FilterEngine::new(build_backend(config)?, store));
    let (handle, controller) = ExecutionController::spawn(engine, config.quiet_interval());

    let mut reports = handle.reports();
    let printer = tokio::spawn(async move {
        while reports.changed().await.is_ok() {
            let latest = reports.borrow_and_update().clone();
            if let Some(report) = latest {
                print_report(&report);
            }
        }
    });

    tracing::info!(
        "👀 Watching {} and {} (Ctrl-C to stop)",
        input.display(),
        filter.display()
    );

    let mut last_seen: Option<Session> = None;
    let mut ticker = tokio::time::interval(poll_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => match read_session(input, filter).await {
                Ok(session) if last_seen.as_ref() != Some(&session) => {
                    handle.request(session.clone())?;
                    last_seen = Some(session);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Could not read watched files: {}", e),
            },
            _ = &mut shutdown => {
                tracing::info!("Stopping watch");
                break;
            }
        }
    }

    drop(handle);
    if let Err(e) = controller.await {
        tracing::warn!("Controller task ended abnormally: {}", e);
    }
    let _ = printer.await;
    Ok(())
}

async fn import(
    store: &Store,
    input: Option<&Path>,
    raw: bool,
    filter: Option<&Path>,
) -> Result<()> {
    let mut session = restore_session(store).await;

    if let Some(path) = input {
        let mode = if raw {
            ImportMode::RawLines
        } else {
            ImportMode::Records
        };
        session = with_input(&session, &read_text(path).await?, mode);
        tracing::info!("📥 Imported input from {}", path.display());
    }
    if let Some(path) = filter {
        session = with_filter(&session, &read_text(path).await?);
        tracing::info!("📥 Imported filter from {}", path.display());
    }

    store.save(&session).await
}

async fn export(config: &TomlConfig, store: &Store, filter: Option<&Path>, out: &Path) -> Result<()> {
    let script = match filter {
        Some(path) => read_text(path).await?,
        None => restore_session(store).await.filter,
    };

    let document = export_config(&script, &config.callback.entry_point, chrono::Utc::now());
    tokio::fs::write(out, document).await?;

    tracing::info!("📁 Configuration saved to: {}", out.display());
    println!("📁 Configuration saved to: {}", out.display());
    Ok(())
}

async fn reset(store: &Store) -> Result<()> {
    store.clear().await?;
    tracing::info!("🧹 Saved session cleared");
    println!("🧹 Saved session cleared; the built-in sample will be used on next start");
    Ok(())
}
