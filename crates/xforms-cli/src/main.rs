use anyhow::{Context, Result, anyhow, bail};
use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use clap::{Parser as ClapParser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xforms_engine::{EngineConfig, FormDefinition, FormInstance, FormModel, NodeDefinition, NodeDefinitionKind, PlainFactory};
use xforms_xpath_lite::XPathEvaluator;

#[derive(ClapParser)]
#[command(name = "xforms")]
#[command(about = "XForms engine CLI")]
struct Cli {
    /// Log engine activity (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every expression of a JSON form definition and compile it
    Check {
        /// Path to the form definition
        form: PathBuf,
    },
    /// Load a form, apply scripted steps and print the resulting state
    Run {
        /// Path to the form definition
        form: PathBuf,
        /// JSON array of steps to apply in order
        #[arg(long)]
        script: Option<PathBuf>,
        /// Engine configuration as JSON
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the instance XML instead of the JSON snapshot
        #[arg(long)]
        xml: bool,
    },
}

/// One client action of a `run` script.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Set {
        reference: String,
        value: String,
    },
    Add {
        range: String,
        #[serde(default)]
        after: Option<usize>,
        #[serde(default = "one")]
        count: usize,
    },
    Remove {
        range: String,
        start: usize,
        #[serde(default = "one")]
        count: usize,
    },
    Language {
        language: String,
    },
}

fn one() -> usize {
    1
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Check { form } => check(&form),
        Commands::Run {
            form,
            script,
            config,
            xml,
        } => run(&form, script.as_deref(), config.as_deref(), xml),
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {what} {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {what} {}", path.display()))
}

fn check(path: &Path) -> Result<()> {
    let definition: FormDefinition = read_json(path, "form")?;
    eprintln!("Checking: {}", path.display());

    let expressions = collect_expressions(&definition);
    let mut failed = 0;
    for (origin, expression) in &expressions {
        if let Err(errors) = xforms_xpath_lite::parse(expression) {
            failed += 1;
            report_errors(origin, expression, &errors);
        }
    }
    if failed > 0 {
        bail!("{failed} of {} expressions failed to parse", expressions.len());
    }

    let model = FormModel::compile(&definition).context("compiling form")?;
    eprintln!(
        "OK: {} nodes, {} expressions, {} actions",
        model.nodes().count(),
        expressions.len(),
        model.actions.len()
    );
    Ok(())
}

/// Every expression of the definition, labelled with where it comes from.
fn collect_expressions(definition: &FormDefinition) -> Vec<(String, String)> {
    fn walk(node: &NodeDefinition, parent: &str, found: &mut Vec<(String, String)>) {
        let nodeset = format!("{parent}/{}", node.name);
        let binds = [
            ("calculate", &node.binds.calculate),
            ("relevant", &node.binds.relevant),
            ("readonly", &node.binds.readonly),
            ("required", &node.binds.required),
            ("constraint", &node.binds.constraint),
        ];
        for (bind, expression) in binds {
            if let Some(expression) = expression {
                found.push((format!("{nodeset} {bind}"), expression.clone()));
            }
        }
        if let NodeDefinitionKind::Repeat {
            count: Some(count), ..
        } = &node.kind
        {
            found.push((format!("{nodeset} count"), count.clone()));
        }
        for child in &node.children {
            walk(child, &nodeset, found);
        }
    }

    let mut found = Vec::new();
    walk(&definition.root, "", &mut found);
    for action in &definition.actions {
        if let Some(value) = &action.value {
            found.push((format!("{} {} value", action.target, action.event), value.clone()));
        }
    }
    found
}

fn report_errors(origin: &str, source: &str, errors: &[xforms_xpath_lite::SyntaxError]) {
    for error in errors {
        let result = Report::build(ReportKind::Error, (origin, error.span.clone()))
            .with_config(
                Config::default()
                    .with_color(false)
                    .with_index_type(IndexType::Byte),
            )
            .with_message(&error.message)
            .with_label(Label::new((origin, error.span.clone())).with_message(&error.reason))
            .finish()
            .eprint((origin, Source::from(source)));
        if let Err(io_error) = result {
            eprintln!("{origin}: {} ({io_error})", error.message);
        }
    }
}

fn run(path: &Path, script: Option<&Path>, config: Option<&Path>, xml: bool) -> Result<()> {
    let definition: FormDefinition = read_json(path, "form")?;
    let config: EngineConfig = match config {
        Some(config) => read_json(config, "config")?,
        None => EngineConfig::default(),
    };
    let steps: Vec<Step> = match script {
        Some(script) => read_json(script, "script")?,
        None => Vec::new(),
    };

    let model = Arc::new(FormModel::compile(&definition).context("compiling form")?);
    let mut instance = FormInstance::new(model, Arc::new(XPathEvaluator::new()), PlainFactory, config)
        .context("loading form")?;

    for (index, step) in steps.iter().enumerate() {
        log::debug!("step {}: {step:?}", index + 1);
        apply(&mut instance, step).with_context(|| format!("step {} ({step:?})", index + 1))?;
    }

    if xml {
        println!("{}", instance.instance_xml()?);
    } else {
        let snapshot = instance.snapshot()?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    Ok(())
}

fn apply(instance: &mut FormInstance, step: &Step) -> Result<()> {
    match step {
        Step::Set { reference, value } => {
            let node = instance
                .find(reference)
                .ok_or_else(|| anyhow!("no single node at {reference}"))?;
            instance.set_value(node, value)?;
        }
        Step::Add { range, after, count } => {
            let node = instance
                .find_range(range)
                .ok_or_else(|| anyhow!("no repeat at {range}"))?;
            instance.add_instances(node, *after, *count)?;
        }
        Step::Remove { range, start, count } => {
            let node = instance
                .find_range(range)
                .ok_or_else(|| anyhow!("no repeat at {range}"))?;
            instance.remove_instances(node, *start, *count)?;
        }
        Step::Language { language } => {
            instance.set_language(language)?;
        }
    }
    Ok(())
}
