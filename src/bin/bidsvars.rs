use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum, error::ErrorKind};

use bidsvars::constants::groups::TEMPLATES_GROUP;
use bidsvars::{
    ConfigModel, DirectoryIndex, FileTypeCatalog, KeyNames, LabelLevel, Scalar, SubjectResolver,
    Value, ValueKind, Wildcard, WildcardPolicy, WildcardVariant, standard_model,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    Generic,
    Path,
    Template,
}

impl From<VariantArg> for WildcardVariant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Generic => WildcardVariant::Generic,
            VariantArg::Path => WildcardVariant::Path,
            VariantArg::Template => WildcardVariant::Template,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Str,
    Int,
    Float,
    Bool,
}

impl From<KindArg> for ValueKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Str => ValueKind::Str,
            KindArg::Int => ValueKind::Int,
            KindArg::Float => ValueKind::Float,
            KindArg::Bool => ValueKind::Bool,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "bidsvars",
    disable_help_subcommand = true,
    about = "Manage typed wildcard configuration models",
    long_about = "Create, edit, and persist wildcard configuration models, derive filename \
                  templates from them, and resolve the subjects of a dataset tree that carry \
                  a complete set of expected files."
)]
struct Cli {
    #[arg(
        long,
        value_name = "FILE",
        default_value = "model.json",
        help = "Model file the command operates on"
    )]
    model: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a fresh standard model
    Init {
        #[arg(value_name = "NAME", help = "Model name stored in the document header")]
        name: String,
        #[arg(
            long = "file-type",
            value_name = "TYPE",
            default_value = "func",
            help = "File type for the dataset group, repeat as needed"
        )]
        file_types: Vec<String>,
        #[arg(long, help = "Start from every catalog label instead of the minimal set")]
        all: bool,
    },
    /// Print the model document
    Show {
        #[arg(value_name = "GROUP", help = "Limit output to one group")]
        group: Option<String>,
        #[arg(long, help = "Include group and wildcard policies")]
        policies: bool,
    },
    /// Set a wildcard's value
    Set {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(value_name = "LABEL")]
        label: String,
        #[arg(
            required = true,
            value_name = "VALUE",
            help = "Value element(s), parsed against the wildcard's declared kind"
        )]
        values: Vec<String>,
    },
    /// Add a wildcard to a group
    Add {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(value_name = "LABEL")]
        label: String,
        #[arg(value_name = "VALUE", help = "Initial value element(s), if any")]
        values: Vec<String>,
        #[arg(long, value_enum, help = "Wildcard variant accepted by the group")]
        variant: Option<VariantArg>,
        #[arg(long, value_enum, help = "Element kind the wildcard accepts")]
        kind: Option<KindArg>,
        #[arg(long, help = "Protect the wildcard against removal")]
        required: bool,
        #[arg(long, help = "Hold a list of elements instead of a single one")]
        iterable: bool,
        #[arg(
            long = "help-text",
            value_name = "TEXT",
            help = "Help text stored in the wildcard policy"
        )]
        help_text: Option<String>,
    },
    /// Remove a wildcard from a group
    Remove {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(value_name = "LABEL")]
        label: String,
    },
    /// Mark a wildcard as required
    Require {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(value_name = "LABEL")]
        label: String,
    },
    /// Mark a wildcard as optional
    Optional {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(value_name = "LABEL")]
        label: String,
    },
    /// Reset wildcard values to their declared defaults
    Reset {
        #[arg(value_name = "GROUP", help = "Group to reset; every group when omitted")]
        group: Option<String>,
    },
    /// Strip a group back to its required wildcards
    FactoryReset {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(long, help = "Also drop required wildcards and the group policy")]
        force: bool,
    },
    /// Derive default filename templates from the dataset group
    MakeTemplates,
    /// Resolve the subjects of a dataset tree against the model
    Resolve {
        #[arg(value_name = "DATASET", help = "Root of the dataset tree to index")]
        dataset: PathBuf,
    },
}

fn main() -> ExitCode {
    match run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run<I>(args: I) -> Result<(), Box<dyn Error>>
where
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<Cli, _>(args)? else {
        return Ok(());
    };
    let Cli { model: path, command } = cli;

    match command {
        Command::Init {
            name,
            file_types,
            all,
        } => run_init(&path, &name, &file_types, all),
        Command::Show { group, policies } => run_show(&path, group.as_deref(), policies),
        Command::Set {
            group,
            label,
            values,
        } => mutate(&path, |model| run_set(model, &group, &label, &values)),
        Command::Add {
            group,
            label,
            values,
            variant,
            kind,
            required,
            iterable,
            help_text,
        } => mutate(&path, |model| {
            let kind = kind.map(ValueKind::from);
            let value = if values.is_empty() {
                None
            } else {
                Some(parse_value(&values, kind)?)
            };
            let policy = WildcardPolicy {
                help: help_text,
                required,
                kind,
                iterable,
                ..WildcardPolicy::default()
            };
            let variant = variant.map(WildcardVariant::from).unwrap_or_default();
            model
                .group_mut(&group)?
                .add(Wildcard::with_variant(label.as_str(), value, variant, policy)?)?;
            println!("added {group}.{label}");
            Ok(())
        }),
        Command::Remove { group, label } => mutate(&path, |model| {
            model.group_mut(&group)?.remove(&label)?;
            println!("removed {group}.{label}");
            Ok(())
        }),
        Command::Require { group, label } => mutate(&path, |model| {
            model
                .group_mut(&group)?
                .get_mut(&label)?
                .update_policy(|policy| policy.required = true)?;
            println!("{group}.{label} is now required");
            Ok(())
        }),
        Command::Optional { group, label } => mutate(&path, |model| {
            model
                .group_mut(&group)?
                .get_mut(&label)?
                .update_policy(|policy| policy.required = false)?;
            println!("{group}.{label} is now optional");
            Ok(())
        }),
        Command::Reset { group } => mutate(&path, |model| run_reset(model, group.as_deref())),
        Command::FactoryReset { group, force } => mutate(&path, |model| {
            model.group_mut(&group)?.factory_reset(force)?;
            println!("factory reset {group}");
            Ok(())
        }),
        Command::MakeTemplates => mutate(&path, run_make_templates),
        Command::Resolve { dataset } => mutate(&path, |model| run_resolve(model, &dataset)),
    }
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

/// Load the model, apply one mutation, and write it back.
fn mutate(
    path: &Path,
    op: impl FnOnce(&mut ConfigModel) -> Result<(), Box<dyn Error>>,
) -> Result<(), Box<dyn Error>> {
    let mut model = ConfigModel::load(path)?;
    op(&mut model)?;
    model.save()?;
    Ok(())
}

fn run_init(
    path: &Path,
    name: &str,
    file_types: &[String],
    all: bool,
) -> Result<(), Box<dyn Error>> {
    let level = if all {
        LabelLevel::All
    } else {
        LabelLevel::Minimal
    };
    let requested: Vec<&str> = file_types.iter().map(String::as_str).collect();
    let mut model = standard_model(name, &requested, level, FileTypeCatalog::builtin())?;
    model.set_source(path)?;
    model.save()?;
    println!("initialized model '{name}' at {}", path.display());
    Ok(())
}

fn run_show(path: &Path, group: Option<&str>, policies: bool) -> Result<(), Box<dyn Error>> {
    let model = ConfigModel::load(path)?;
    let document = match group {
        Some(name) => model.group(name)?.to_document(policies)?,
        None => model.to_document(policies, true)?,
    };
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn run_set(
    model: &mut ConfigModel,
    group: &str,
    label: &str,
    values: &[String],
) -> Result<(), Box<dyn Error>> {
    let kind = model.group(group)?.get(label)?.policy().kind;
    let value = parse_value(values, kind)?;
    model.group_mut(group)?.get_mut(label)?.set_value(value)?;
    let rendered = model
        .group(group)?
        .get(label)?
        .value()
        .map(|value| value.render_all().join(", "))
        .unwrap_or_default();
    println!("{group}.{label} = [{rendered}]");
    Ok(())
}

fn run_reset(model: &mut ConfigModel, group: Option<&str>) -> Result<(), Box<dyn Error>> {
    match group {
        Some(name) => {
            model.group_mut(name)?.reset()?;
            println!("reset {name}");
        }
        None => {
            let names: Vec<String> = model
                .groups()
                .map(|group| group.name().to_string())
                .collect();
            for name in &names {
                model.group_mut(name)?.reset()?;
            }
            println!("reset {} group(s)", names.len());
        }
    }
    Ok(())
}

fn run_make_templates(model: &mut ConfigModel) -> Result<(), Box<dyn Error>> {
    let labels = model.make_default_templates(KeyNames::builtin(), FileTypeCatalog::builtin())?;
    println!("installed {} template(s):", labels.len());
    for label in &labels {
        let rendered = model
            .group(TEMPLATES_GROUP)?
            .get(label)?
            .value()
            .map(|value| value.render_all().join(", "))
            .unwrap_or_default();
        println!("  {label} = {rendered}");
    }
    Ok(())
}

fn run_resolve(model: &mut ConfigModel, dataset: &Path) -> Result<(), Box<dyn Error>> {
    let index = DirectoryIndex::open(dataset)?;
    let resolver = SubjectResolver::new(&index, KeyNames::builtin(), FileTypeCatalog::builtin());
    let report = resolver.resolve(model)?;
    for line in &report.log {
        println!("{line}");
    }
    println!(
        "retained {} of {} subject(s): [{}]",
        report.retained.len(),
        report.retained.len() + report.excluded.len(),
        report.retained.join(", ")
    );
    Ok(())
}

fn parse_value(values: &[String], kind: Option<ValueKind>) -> Result<Value, Box<dyn Error>> {
    let mut scalars = Vec::with_capacity(values.len());
    for raw in values {
        scalars.push(parse_scalar(raw, kind)?);
    }
    Ok(match scalars.len() {
        1 => Value::One(scalars.remove(0)),
        _ => Value::Many(scalars),
    })
}

fn parse_scalar(raw: &str, kind: Option<ValueKind>) -> Result<Scalar, Box<dyn Error>> {
    let trimmed = raw.trim();
    match kind {
        Some(ValueKind::Int) => Ok(Scalar::Int(trimmed.parse::<i64>().map_err(|_| {
            format!("invalid value '{raw}': must be an integer")
        })?)),
        Some(ValueKind::Float) => Ok(Scalar::Float(trimmed.parse::<f64>().map_err(|_| {
            format!("invalid value '{raw}': must be a float")
        })?)),
        Some(ValueKind::Bool) => match trimmed {
            "true" => Ok(Scalar::Bool(true)),
            "false" => Ok(Scalar::Bool(false)),
            _ => Err(format!("invalid value '{raw}': must be true or false").into()),
        },
        Some(ValueKind::Str) | None => Ok(Scalar::from(raw)),
    }
}
