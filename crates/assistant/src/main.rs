use clap::Parser;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pa_assistant::cli::{self, Cli, Command, ConfigCommand};
use pa_domain::config::ObservabilityConfig;
use pa_providers::HybridFlags;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Provider keys may live in a local .env file.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Command::Ask {
            prompt,
            category,
            system,
            json,
        } => {
            let (config, _) = cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            let router = cli::build_router(&config)?;
            let result = cli::ask::ask(&router, &prompt, category, system, json).await;
            router.close();
            shutdown_tracing(tracer_provider);
            result
        }
        Command::Hybrid {
            prompt,
            no_search,
            no_reasoning,
            synthesize,
            instruction,
            json,
        } => {
            let (config, _) = cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            let router = cli::build_router(&config)?;
            let flags = HybridFlags {
                use_search: !no_search,
                use_reasoning: !no_reasoning,
            };
            let result = cli::hybrid::run(
                &router,
                &prompt,
                flags,
                synthesize,
                instruction.as_deref(),
                json,
            )
            .await;
            router.close();
            shutdown_tracing(tracer_provider);
            result
        }
        Command::FactCheck {
            statement,
            context,
            json,
        } => {
            let (config, _) = cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            let router = cli::build_router(&config)?;
            let result = cli::ask::fact_check(&router, &statement, context, json).await;
            router.close();
            shutdown_tracing(tracer_provider);
            result
        }
        Command::Research {
            topic,
            focus,
            time_range,
            json,
        } => {
            let (config, _) = cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            let router = cli::build_router(&config)?;
            let result =
                cli::ask::research(&router, &topic, &focus, time_range.as_deref(), json).await;
            router.close();
            shutdown_tracing(tracer_provider);
            result
        }
        Command::Check => {
            let (config, config_path) = cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            let passed = cli::check::run(&config, &config_path).await?;
            shutdown_tracing(tracer_provider);
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = cli::load_config()?;
            cli::config::show(&config)
        }
        Command::Version => {
            println!("assistant {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize tracing on stderr so stdout carries only answers.
///
/// `RUST_LOG` wins over `observability.log_filter`. When `otlp_endpoint`
/// is configured, an OpenTelemetry layer also exports every span via
/// OTLP/gRPC; the returned [`SdkTracerProvider`] must be shut down on exit
/// to flush pending spans.
///
/// [`SdkTracerProvider`]: opentelemetry_sdk::trace::SdkTracerProvider
fn init_tracing(obs: &ObservabilityConfig) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));

    let json_layer = obs.json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let compact_layer = (!obs.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
    });

    let tracer_provider = obs
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_tracer_provider(endpoint, obs));
    let otel_layer = tracer_provider
        .as_ref()
        .map(|tp| tracing_opentelemetry::layer().with_tracer(tp.tracer("assistant")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(compact_layer)
        .with(otel_layer)
        .init();

    tracer_provider
}

fn build_tracer_provider(
    endpoint: &str,
    obs: &ObservabilityConfig,
) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!(
                "WARNING: failed to create OTLP exporter for {endpoint}: {e}; \
                 continuing without OpenTelemetry"
            );
            return None;
        }
    };

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(obs.service_name.clone())
        .build();

    Some(
        opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(
                obs.sample_rate,
            ))
            .with_resource(resource)
            .build(),
    )
}

fn shutdown_tracing(tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>) {
    if let Some(tp) = tracer_provider {
        if let Err(e) = tp.shutdown() {
            eprintln!("WARNING: OpenTelemetry shutdown failed: {e}");
        }
    }
}
