//! Subcommand implementations

use crate::{CompileCmd, GlobalArgs, RecheckCmd, CLI_VERSION};
use anyhow::{anyhow, Context, Result};
use builder_core::artifact::Styles;
use builder_core::reconcile::{LocalFs, RecheckOutcome};
use builder_core::store::ArtifactStore;
use builder_core::templates::{builtin, export, version, CatalogSource, LoadedCatalog, TemplateFetcher};
use builder_core::tui::{run_recheck, RecheckArgs};
use builder_core::{
    ArtifactKind, BuilderConfig, CompileError, CompiledArtifact, Compiler, DirectoryStore,
    InstallationManifest, ManifestCatalog, Reconciler, RepairOptions, Resolver, TargetDialect,
};
use colored::Colorize;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// File name of the installation catalog when a source does not name one
const INSTALL_CATALOG: &str = "install.yaml";

/// A project root with its resolved configuration
pub struct Project {
    root: PathBuf,
    config: BuilderConfig,
    source: CatalogSource,
}

impl Project {
    /// Load `builder.yaml`, then let command-line flags win over it and the
    /// environment
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let root = global.project.clone();
        let config = BuilderConfig::load(&root)
            .with_context(|| format!("Failed to load configuration from {}", root.display()))?;

        let source = match (&global.template_dir, &global.template_url) {
            (Some(dir), _) => CatalogSource::local(dir.clone()),
            (None, Some(url)) => CatalogSource::Remote(
                Url::parse(url).with_context(|| format!("Invalid template URL: {}", url))?,
            ),
            (None, None) => config.catalog_source()?,
        };
        debug!(root = %root.display(), ?source, dialect = %config.dialect, "opened project");

        Ok(Self {
            root,
            config,
            source,
        })
    }

    async fn catalog(&self) -> Result<LoadedCatalog> {
        let user_agent = format!("builder-cli/{}", CLI_VERSION);
        let catalog = TemplateFetcher::new(self.source.clone(), &user_agent)
            .load()
            .await
            .context("Failed to load template catalog")?;
        if let Some(warning) = version::warn_if_incompatible(&catalog.root.version) {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }
        Ok(catalog)
    }

    async fn compiler(&self) -> Result<Compiler> {
        let registry = self.catalog().await?.registry()?;
        Ok(Compiler::new(Arc::new(registry), Resolver::builtin()))
    }

    /// Installation manifest for the configured features
    async fn manifest(&self, resolver: &Resolver) -> Result<InstallationManifest> {
        let catalog = self.catalog().await?;
        let content = match catalog.install {
            Some(content) => content,
            None => builtin::file(INSTALL_CATALOG)
                .ok_or_else(|| anyhow!("No installation catalog available"))?
                .to_string(),
        };
        let catalog = ManifestCatalog::parse(INSTALL_CATALOG, &content, resolver)
            .context("Failed to parse installation catalog")?;
        let features = self.config.features();
        debug!(?features, version = catalog.version(), "building installation manifest");
        catalog
            .manifest(&features)
            .context("Failed to build installation manifest")
    }

    fn store(&self) -> DirectoryStore {
        DirectoryStore::new(self.config.store_path(&self.root))
    }
}

/// `builder recheck`, `install` and `update`
pub async fn recheck(project: &Project, cmd: RecheckCmd) -> Result<ExitCode> {
    let resolver = Resolver::builtin();
    let manifest = project.manifest(&resolver).await?;
    let reconciler = Reconciler::new(Arc::new(LocalFs::new(&project.root)), resolver)
        .with_jobs(cmd.jobs.unwrap_or(project.config.jobs));

    let interactive = !cmd.yes && !cmd.json && console::Term::stdout().is_term();
    let outcome = if interactive {
        run_recheck(
            &reconciler,
            &manifest,
            RecheckArgs {
                fix: cmd.fix,
                force: cmd.force,
                yes: cmd.yes,
            },
        )
        .await?
    } else {
        let options = RepairOptions {
            fix: cmd.fix,
            force: cmd.force,
        };
        let outcome = reconciler.recheck(&manifest, options).await?;
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print_outcome(&outcome);
        }
        outcome
    };

    Ok(if outcome.is_satisfied() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_outcome(outcome: &RecheckOutcome) {
    match &outcome.repair {
        Some(repair) => {
            print!("{}", repair.render_table());
            for entry in repair.failures() {
                eprintln!("{} {}: {}", "failed:".red().bold(), entry.entry, entry.repair);
            }
        }
        None => print!("{}", outcome.audit.render_table()),
    }

    let summary = outcome.final_report.summary();
    if outcome.is_satisfied() {
        println!("{} {}", "✓".green(), summary);
    } else {
        println!("{} {}", "✗".red(), summary);
        if outcome.repair.is_none() {
            println!("Run `builder recheck --fix` to repair missing entries");
        }
    }
}

/// Input file contents: bare properties, or an envelope carrying them
#[derive(Debug, Default, Deserialize)]
struct CompileInput {
    #[serde(default)]
    id: Option<String>,
    properties: serde_json::Value,
    #[serde(default)]
    styles: Option<Styles>,
    #[serde(default)]
    scripts: Option<String>,
}

impl CompileInput {
    fn parse(content: &str) -> Result<Self> {
        let json: serde_json::Value =
            serde_json::from_str(content).context("Input is not valid JSON")?;
        if json.get("properties").is_some_and(|p| p.is_object()) {
            serde_json::from_value(json).context("Invalid compile input")
        } else {
            Ok(Self {
                properties: json,
                ..Self::default()
            })
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = if path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read input from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?
        };
        Self::parse(&content)
    }
}

/// `builder compile`
pub async fn compile(project: &Project, cmd: CompileCmd) -> Result<ExitCode> {
    let store = project.store();
    let input = match (&cmd.input, &cmd.from_store) {
        (Some(path), _) => CompileInput::read(path)?,
        (None, Some(id)) => CompileInput {
            id: Some(id.clone()),
            properties: store
                .get(cmd.kind, id)
                .with_context(|| format!("Failed to read {} `{}` from the store", cmd.kind, id))?,
            ..CompileInput::default()
        },
        (None, None) => return Err(anyhow!("Either --input or --from-store is required")),
    };

    let compiler = project.compiler().await?;
    let dialect = cmd.dialect.unwrap_or(project.config.dialect);

    let (id, outputs) = match compile_outputs(&compiler, &cmd, &input, dialect) {
        Ok(compiled) => compiled,
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_body())?);
            return Ok(ExitCode::FAILURE);
        }
    };

    if cmd.save {
        store
            .put(cmd.kind, &id, &input.properties)
            .with_context(|| format!("Failed to save {} `{}`", cmd.kind, id))?;
        info!(kind = %cmd.kind, %id, "saved artifact properties");
    }

    let json = if cmd.all {
        let mut map = serde_json::Map::new();
        for (dialect, artifact) in &outputs {
            map.insert(dialect.as_str().to_string(), serde_json::to_value(artifact)?);
        }
        serde_json::Value::Object(map)
    } else {
        serde_json::to_value(&outputs[0].1)?
    };
    let rendered = serde_json::to_string_pretty(&json)?;

    match &cmd.output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", rendered))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", "✓".green(), path.display());
        }
        None => println!("{}", rendered),
    }

    if let Some(path) = &cmd.zip {
        let bytes = export::bundle(&id, &outputs)?;
        std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("{} Bundled {} into {}", "✓".green(), id, path.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn compile_outputs(
    compiler: &Compiler,
    cmd: &CompileCmd,
    input: &CompileInput,
    dialect: TargetDialect,
) -> Result<(String, Vec<(TargetDialect, CompiledArtifact)>), CompileError> {
    let id = cmd.id.as_deref().or(input.id.as_deref());
    let descriptor = compiler.describe(
        cmd.kind,
        &input.properties,
        id,
        input.styles.clone(),
        input.scripts.clone(),
    )?;

    let outputs = if cmd.all {
        compiler.compile_all(&descriptor)?
    } else {
        vec![(dialect, compiler.compile(&descriptor, dialect)?)]
    };

    Ok((descriptor.id, outputs))
}

/// `builder templates`
pub async fn templates(project: &Project) -> Result<ExitCode> {
    let registry = project.catalog().await?.registry()?;
    let mut current: Option<ArtifactKind> = None;
    for key in registry.keys() {
        if current != Some(key.kind) {
            println!("{}", key.kind.to_string().bold());
            current = Some(key.kind);
        }
        match &key.variant {
            Some(variant) => println!("  {:<12} {}", variant.cyan(), key.dialect),
            None => println!("  {:<12} {}", "-".dimmed(), key.dialect),
        }
    }
    println!("\n{} templates", registry.len());
    Ok(ExitCode::SUCCESS)
}
