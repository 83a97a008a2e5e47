//! BrainQuiz - command-line client for the BrainQuiz backend

use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, error};

use brainquiz_client::{
    api::ApiClient,
    cli::{ApiCommand, Cli, Command, OutputFormat},
    config::Config,
    export::write_audit_csv,
    models::AuditLogQuery,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(ref base_url) = cli.base_url {
                config.api.base_url.clone_from(base_url);
            }
            if let Some(ref token) = cli.token {
                config.api.token = Some(token.clone());
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let command = match cli.command {
        Command::Api(command) => command,
        Command::Config => {
            let mut shown = config.clone();
            if shown.api.token.is_some() {
                shown.api.token = Some("<redacted>".to_string());
            }
            return print(&shown, cli.output);
        }
    };

    let client = match ApiClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create client: {e}");
            return ExitCode::FAILURE;
        }
    };

    debug!(
        base_url = %config.api.base_url,
        max_concurrent = config.dispatcher.max_concurrent,
        cache = config.cache.enabled,
        "Client ready"
    );

    let code = run(&client, command, cli.output).await;

    if cli.stats {
        print_stats(&client);
    }
    code
}

async fn run(client: &ApiClient, command: ApiCommand, output: OutputFormat) -> ExitCode {
    let result = match command {
        ApiCommand::List { resource } => client.list(resource).await,
        ApiCommand::Class { id } => client.get_class(id).await,
        ApiCommand::ClassQuizzes { class_id } => client.quizzes_by_class(class_id).await,
        ApiCommand::QuizQuestions { quiz_id } => client.questions_by_quiz(quiz_id).await,
        ApiCommand::Delete { resource, id } => client.delete(resource, id).await,
        ApiCommand::Joined => client.joined_classes().await,
        ApiCommand::Join { code } => client.join_class(&code).await,
        ApiCommand::Leave { class_id } => client.leave_class(class_id).await,
        ApiCommand::Results => client.my_results().await,
        ApiCommand::Audit {
            page,
            limit,
            username,
            action,
            date_from,
            date_to,
            ip,
            csv,
        } => {
            let query = AuditLogQuery {
                page,
                limit,
                username,
                action,
                date_from,
                date_to,
                ip,
            };
            return match client.audit_logs(&query).await {
                Ok(page) => match csv {
                    Some(path) => {
                        let written = File::create(&path)
                            .map_err(brainquiz_client::Error::from)
                            .and_then(|file| write_audit_csv(&page.logs, BufWriter::new(file)));
                        match written {
                            Ok(()) => {
                                eprintln!(
                                    "Wrote {} audit log(s) to {}",
                                    page.logs.len(),
                                    path.display()
                                );
                                ExitCode::SUCCESS
                            }
                            Err(e) => {
                                eprintln!("Export failed: {e}");
                                ExitCode::FAILURE
                            }
                        }
                    }
                    None => print(&page, output),
                },
                Err(e) => {
                    eprintln!("Request failed: {e}");
                    ExitCode::FAILURE
                }
            };
        }
    };

    match result {
        Ok(value) => print(&value, output),
        Err(e) => {
            eprintln!("Request failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print<T: Serialize>(value: &T, output: OutputFormat) -> ExitCode {
    let rendered = match output {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
    };
    match rendered {
        Ok(text) => {
            println!("{}", text.trim_end());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to render output: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_stats(client: &ApiClient) {
    let fetcher = client.fetcher();
    let dispatch = fetcher.dispatcher().stats();
    eprintln!(
        "dispatcher: submitted={} succeeded={} failed={} peak_in_flight={}",
        dispatch.submitted, dispatch.succeeded, dispatch.failed, dispatch.peak_in_flight
    );
    if let Some(cache) = fetcher.cache() {
        let stats = cache.stats();
        eprintln!(
            "cache: hits={} misses={} stale={} invalidations={} size={}",
            stats.hits, stats.misses, stats.stale, stats.invalidations, stats.size
        );
    }
}
