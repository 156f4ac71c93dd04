//! resume-relevance: hybrid resume and job description relevance scoring

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use resume_relevance::cli::{self, Cli, Commands, ConfigAction};
use resume_relevance::config::{Config, OutputFormat};
use resume_relevance::input::InputManager;
use resume_relevance::output::{save_report_to_file, suggest_filename, ReportGenerator};
use resume_relevance::processing::batch::{BatchProgress, ResumeInput};
use resume_relevance::processing::requirements::ParsedJobDescription;
use resume_relevance::{AnalysisEngine, BatchRunner, JobContext, JobRequirement};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command, config, cli.config).await {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, mut config: Config, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Score {
            resume,
            job,
            no_reasoning,
            detailed,
            output,
            save,
        } => {
            cli::validate_file_extension(&resume, &["pdf", "txt", "md", "markdown"])
                .map_err(|e| anyhow::anyhow!("Resume file: {}", e))?;
            let format = resolve_format(output.as_deref(), &config)?;
            if no_reasoning {
                config.reasoning.enabled = false;
            }

            let engine = AnalysisEngine::from_config(config.clone())?;
            let mut input_manager = InputManager::new();

            let job_context = load_job(&engine, &mut input_manager, &job).await?;
            let resume_doc = input_manager
                .load_resume(&resume, config.extraction.min_resume_chars)
                .await
                .with_context(|| format!("Failed to read resume {}", resume.display()))?;

            info!("Scoring {} against '{}'", resume.display(), job_context.requirement().role_title);
            let result = engine.analyze(&resume_doc, &job_context).await?;

            let generator = report_generator(&config, format, detailed, save.is_some());
            let content = generator.generate_report(&result, &format)?;
            emit(&content, save.as_deref(), format, &resume)?;
        }

        Commands::Batch {
            job,
            resumes,
            concurrency,
            no_reasoning,
            detailed,
            output,
            save,
        } => {
            let format = resolve_format(output.as_deref(), &config)?;
            if no_reasoning {
                config.reasoning.enabled = false;
            }
            if let Some(concurrency) = concurrency {
                config.batch.concurrency = concurrency;
            }

            let engine = Arc::new(AnalysisEngine::from_config(config.clone())?);
            let mut input_manager = InputManager::new();
            let job_context = Arc::new(load_job(&engine, &mut input_manager, &job).await?);

            let files = input_manager.collect_files(&resumes)?;
            if files.is_empty() {
                anyhow::bail!("No supported resume files found");
            }

            let mut inputs = Vec::with_capacity(files.len());
            for path in &files {
                let id = path.display().to_string();
                match input_manager.extract_text(path).await {
                    Ok(text) => inputs.push(ResumeInput::text(id, text)),
                    Err(e) => {
                        warn!("Skipping {}: {}", id, e);
                        inputs.push(ResumeInput::failed(id, e.to_string()));
                    }
                }
            }

            let bar = ProgressBar::new(inputs.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} resumes ({percent}%)")?
                    .progress_chars("#>-"),
            );
            let progress_bar = bar.clone();

            let runner = BatchRunner::new(Arc::clone(&engine)).with_progress(Arc::new(move |progress: BatchProgress| {
                progress_bar.set_position(progress.completed as u64);
            }));

            let cancellation = runner.cancellation();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing in-flight resumes");
                    cancellation.cancel();
                }
            });

            let report = runner.run(job_context, inputs).await;
            bar.finish_and_clear();

            let generator = report_generator(&config, format, detailed, save.is_some());
            let content = generator.generate_batch_report(&report, &format)?;
            emit(&content, save.as_deref(), format, &job)?;
        }

        Commands::Requirements { job } => {
            let engine = AnalysisEngine::new(config)?;
            let mut input_manager = InputManager::new();
            let job_context = load_job(&engine, &mut input_manager, &job).await?;
            print_requirements(job_context.requirement());
        }

        Commands::Config { action } => {
            let path = config_path.unwrap_or_else(Config::config_path);
            match action {
                Some(ConfigAction::Show) | None => {
                    println!("Current Configuration ({})\n", path.display());
                    println!("{}", toml::to_string_pretty(&config)?);
                }

                Some(ConfigAction::Reset) => {
                    Config::default().save_to(&path)?;
                    println!("Configuration reset to defaults: {}", path.display());
                }

                Some(ConfigAction::Path) => {
                    println!("{}", path.display());
                }
            }
        }
    }

    Ok(())
}

/// Structured JSON job descriptions skip requirement extraction.
async fn load_job(engine: &AnalysisEngine, input_manager: &mut InputManager, path: &Path) -> Result<JobContext> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job description {}", path.display()))?;
        let parsed: ParsedJobDescription = serde_json::from_str(&content)
            .with_context(|| format!("Invalid job description JSON in {}", path.display()))?;
        return Ok(JobContext::from_requirement(JobRequirement::from(parsed)));
    }

    let text = input_manager
        .extract_text(path)
        .await
        .with_context(|| format!("Failed to read job description {}", path.display()))?;
    Ok(engine.prepare_job(&text)?)
}

fn resolve_format(requested: Option<&str>, config: &Config) -> Result<OutputFormat> {
    match requested {
        Some(format) => cli::parse_output_format(format).map_err(|e| anyhow::anyhow!(e)),
        None => Ok(config.output.format),
    }
}

fn report_generator(config: &Config, format: OutputFormat, detailed: bool, saving: bool) -> ReportGenerator {
    let use_colors = config.output.color_output && format == OutputFormat::Console && !saving;
    ReportGenerator::with_options(use_colors, detailed || config.output.detailed, true, true)
}

fn emit(content: &str, save: Option<&Path>, format: OutputFormat, source: &Path) -> Result<()> {
    match save {
        Some(target) => {
            let target = if target.is_dir() {
                target.join(suggest_filename(&format, &source.to_string_lossy(), true))
            } else {
                target.to_path_buf()
            };
            save_report_to_file(content, &target)?;
            println!("Report saved to {}", target.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn print_requirements(requirement: &JobRequirement) {
    println!("Role: {}", requirement.role_title);
    if let Some(company) = &requirement.company {
        println!("Company: {}", company);
    }
    if let Some(location) = &requirement.location {
        println!("Location: {}", location);
    }
    if let Some(years) = requirement.min_experience_years {
        println!("Minimum experience: {} years", years);
    }

    let sections = [
        ("Must have", &requirement.must_have),
        ("Good to have", &requirement.good_to_have),
        ("Qualifications", &requirement.qualifications),
        ("Responsibilities", &requirement.responsibilities),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        println!("\n{}:", title);
        for item in items {
            println!("  • {}", item);
        }
    }
}
