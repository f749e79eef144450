use std::io::{self, Write};
use std::process;

use serde_json::json;
use tenancy_cache::{
    application::error::AppError,
    cache::{CacheConfig, CacheContext, InvalidationPlan},
    config::{self, Command, PlanArgs, RenderKeyArgs},
    infra::{error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    info!(
        environment = ?settings.environment,
        strict_keys = settings.cache.strict_keys,
        "Configuration loaded"
    );

    let context = CacheContext::build(&CacheConfig::from(&settings.cache));

    match cli_args.command.unwrap_or(Command::Policies) {
        Command::Policies => print_policies(&context),
        Command::RenderKey(args) => print_key(&context, &args),
        Command::Plan(args) => print_plan(&context, &args),
    }
}

fn print_policies(context: &CacheContext) -> Result<(), AppError> {
    let mut out = io::stdout().lock();
    for (category, policy) in context.policies.categories() {
        let line = json!({
            "category": category,
            "ttl_seconds": policy.ttl.as_secs(),
            "key_template": policy.key_template,
        });
        writeln!(out, "{line}").map_err(InfraError::from)?;
    }
    Ok(())
}

fn print_key(context: &CacheContext, args: &RenderKeyArgs) -> Result<(), AppError> {
    if !context.policies.is_registered(&args.category) {
        info!(category = %args.category, "Category has no policy; using the default");
    }

    let params: Vec<(&str, &str)> = args
        .params
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    let key = context.policies.render_key(&args.category, &params)?;

    writeln!(io::stdout().lock(), "{key}").map_err(InfraError::from)?;
    Ok(())
}

fn print_plan(context: &CacheContext, args: &PlanArgs) -> Result<(), AppError> {
    let event = args.event.to_event();
    let plan = InvalidationPlan::for_event(&event, &context.policies);
    if plan.is_empty() {
        return Err(AppError::validation("event produced an empty plan"));
    }

    let output = serde_json::to_string_pretty(&json!({ "event": event, "plan": plan }))
        .map_err(|err| AppError::unexpected(format!("failed to encode plan: {err}")))?;
    writeln!(io::stdout().lock(), "{output}").map_err(InfraError::from)?;
    Ok(())
}
