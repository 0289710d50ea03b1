//! End-to-end checks against the built-in catalogs

use builder_core::error::{CompileError, ValidationError};
use builder_core::reconcile::{EntryStatus, LocalFs, RepairState};
use builder_core::templates::{builtin, CatalogSource, TemplateFetcher};
use builder_core::{
    ArtifactKind, Compiler, InstallationManifest, ManifestCatalog, Reconciler, RepairOptions,
    Resolver, TargetDialect,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

async fn compiler() -> Compiler {
    let catalog = TemplateFetcher::new(CatalogSource::Builtin, "builder-tests")
        .load()
        .await
        .unwrap();
    Compiler::new(Arc::new(catalog.registry().unwrap()), Resolver::builtin())
}

fn manifest(features: &[&str]) -> InstallationManifest {
    let content = builtin::file("install.yaml").unwrap();
    ManifestCatalog::parse("install.yaml", content, &Resolver::builtin())
        .unwrap()
        .manifest(features)
        .unwrap()
}

fn reconciler(dir: &TempDir) -> Reconciler {
    Reconciler::new(Arc::new(LocalFs::new(dir.path())), Resolver::builtin())
}

fn accordion(items: Value) -> Value {
    json!({"type": "accordion", "items": items})
}

/// Minimal valid properties for every kind/variant the built-in catalog ships
fn samples() -> Vec<(ArtifactKind, Value)> {
    vec![
        (
            ArtifactKind::Component,
            accordion(json!([{"id": "x1", "title": "Intro", "content": "<p>Hi</p>"}])),
        ),
        (
            ArtifactKind::Component,
            json!({"type": "alert", "message": "Saved", "title": "Done"}),
        ),
        (
            ArtifactKind::Page,
            json!({"title": "About us", "slug": "about", "sections": [{"id": "hero", "html": "<h1>Hi</h1>"}]}),
        ),
        (
            ArtifactKind::Api,
            json!({"resource": "posts", "model": "Post", "fields": [{"name": "title"}, {"name": "views", "type": "integer"}]}),
        ),
        (ArtifactKind::Theme, json!({"name": "ocean"})),
        (
            ArtifactKind::Form,
            json!({"action": "/contact", "fields": [{"name": "email", "label": "Email", "type": "email", "required": true}]}),
        ),
        (
            ArtifactKind::Table,
            json!({"columns": [{"key": "name", "label": "Name", "sortable": true}], "endpoint": "/api/users"}),
        ),
    ]
}

#[tokio::test]
async fn test_accordion_in_server_template() {
    let compiler = compiler().await;
    let descriptor = compiler
        .describe(
            ArtifactKind::Component,
            &accordion(json!([{"id": "x1", "title": "Intro", "content": "<p>Hi</p>"}])),
            None,
            None,
            None,
        )
        .unwrap();
    let out = compiler
        .compile(&descriptor, TargetDialect::ServerTemplate)
        .unwrap();

    assert_eq!(out.markup.matches("accordion-item").count(), 1);
    assert!(out.markup.contains(r#"data-item-id="x1""#));
    assert!(out.markup.contains(">Intro</button>"));
    // content is listed as raw for this dialect
    assert!(out.markup.contains("<p>Hi</p>"));
    assert!(out.markup.contains(&format!(r#"id="{}""#, descriptor.id)));
    assert!(out.style.is_some());
}

#[tokio::test]
async fn test_missing_item_title() {
    let compiler = compiler().await;
    let err = compiler
        .describe(
            ArtifactKind::Component,
            &accordion(json!([{"id": "x1"}])),
            None,
            None,
            None,
        )
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::Validation(ValidationError::MissingField("items[0].title".to_string()))
    );

    let body = err.to_body();
    assert_eq!(body.error_kind, "MissingField");
    assert_eq!(body.field.as_deref(), Some("items[0].title"));
}

#[tokio::test]
async fn test_missing_config_file_is_repaired() {
    let dir = TempDir::new().unwrap();
    let r = reconciler(&dir);
    let manifest = manifest(&["core", "server-template"]);

    let audit = r.audit(&manifest);
    let config = audit
        .entries
        .iter()
        .find(|e| e.entry.path == "config/visual-builder.php")
        .unwrap();
    assert_eq!(config.status, EntryStatus::Missing);
    assert!(!audit.is_satisfied());

    let repaired = r.repair(&audit, RepairOptions::fix());
    assert!(repaired.failures().next().is_none());

    let after = r.audit(&manifest);
    assert!(after.is_clean(), "{}", after.summary());
    let written = std::fs::read_to_string(dir.path().join("config/visual-builder.php")).unwrap();
    assert!(written.starts_with("<?php"));
}

#[tokio::test]
async fn test_repair_is_idempotent() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("package.json"), "{\"name\": \"site\"}\n").unwrap();
    let r = reconciler(&dir);
    let manifest = manifest(&["core", "component-framework-b", "themes"]);

    let first = r.recheck(&manifest, RepairOptions::fix()).await.unwrap();
    assert!(first.is_satisfied(), "{}", first.final_report.summary());
    let package_json = std::fs::read_to_string(dir.path().join("package.json")).unwrap();
    let builder_json = std::fs::read_to_string(dir.path().join("builder.json")).unwrap();

    let second = r.recheck(&manifest, RepairOptions::fix()).await.unwrap();
    assert!(second.repair.is_none());
    assert!(second.audit.is_clean());

    let stale = r.repair(&first.audit, RepairOptions::fix());
    assert!(stale
        .entries
        .iter()
        .all(|e| !matches!(e.repair, RepairState::Repaired | RepairState::Failed(_))));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("package.json")).unwrap(),
        package_json
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("builder.json")).unwrap(),
        builder_json
    );
    let package: Value = serde_json::from_str(&package_json).unwrap();
    assert_eq!(package["name"], json!("site"));
    assert!(package["dependencies"]["vue"].is_string());
}

#[tokio::test]
async fn test_compilation_is_deterministic() {
    let compiler = compiler().await;
    for (kind, properties) in samples() {
        let a = compiler.describe(kind, &properties, None, None, None).unwrap();
        let b = compiler.describe(kind, &properties, None, None, None).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(compiler.compile_all(&a).unwrap(), compiler.compile_all(&b).unwrap());
    }
}

#[tokio::test]
async fn test_every_builtin_kind_compiles_in_every_dialect() {
    let compiler = compiler().await;
    for (kind, properties) in samples() {
        let descriptor = compiler.describe(kind, &properties, None, None, None).unwrap();
        let outputs = compiler.compile_all(&descriptor).unwrap();
        assert!(!outputs.is_empty(), "{} has no templates", kind);
        for (dialect, out) in outputs {
            assert!(!out.markup.trim().is_empty(), "{} {} is empty", kind, dialect);
            assert!(!out.markup.contains("[["), "{} {} left a slot", kind, dialect);
        }
    }
}

#[tokio::test]
async fn test_list_order_preserved_in_every_dialect() {
    let compiler = compiler().await;
    let properties = accordion(json!([
        {"id": "a", "title": "Alpha"},
        {"id": "b", "title": "Beta"}
    ]));
    let descriptor = compiler
        .describe(ArtifactKind::Component, &properties, None, None, None)
        .unwrap();

    for dialect in TargetDialect::ALL {
        let out = compiler.compile(&descriptor, dialect).unwrap();
        let alpha = out.markup.find("Alpha").unwrap();
        let beta = out.markup.find("Beta").unwrap();
        assert!(alpha < beta, "{} reordered items", dialect);
    }
}

#[tokio::test]
async fn test_markup_is_escaped_by_default() {
    let compiler = compiler().await;
    let properties = json!({"type": "alert", "message": "<script>alert(1)</script>"});
    let descriptor = compiler
        .describe(ArtifactKind::Component, &properties, None, None, None)
        .unwrap();

    for dialect in [TargetDialect::ServerTemplate, TargetDialect::ReactiveComponent] {
        let out = compiler.compile(&descriptor, dialect).unwrap();
        assert!(!out.markup.contains("<script>alert"), "{} left markup unescaped", dialect);
        assert!(out.markup.contains("&lt;script&gt;"));
    }
}

#[tokio::test]
async fn test_unknown_fields_are_ignored() {
    let compiler = compiler().await;
    let plain = json!({"type": "alert", "message": "Saved"});
    let extra = json!({"type": "alert", "message": "Saved", "tooltip": "ignored"});

    let a = compiler.describe(ArtifactKind::Component, &plain, Some("n"), None, None).unwrap();
    let b = compiler.describe(ArtifactKind::Component, &extra, Some("n"), None, None).unwrap();
    assert_eq!(
        compiler.compile(&a, TargetDialect::ComponentFrameworkA).unwrap(),
        compiler.compile(&b, TargetDialect::ComponentFrameworkA).unwrap()
    );
}

#[tokio::test]
async fn test_blade_syntax_in_values_stays_inert() {
    let compiler = compiler().await;
    let properties = json!({
        "type": "alert",
        "title": "{!! $secret !!}",
        "message": "{{ phpinfo() }} @php(phpinfo()) @endphp"
    });
    let descriptor = compiler
        .describe(ArtifactKind::Component, &properties, None, None, None)
        .unwrap();

    for dialect in [TargetDialect::ServerTemplate, TargetDialect::ReactiveComponent] {
        let out = compiler.compile(&descriptor, dialect).unwrap();
        for directive in ["{{", "{!!", "@php", "@endphp"] {
            assert!(!out.markup.contains(directive), "{} emitted {}", dialect, directive);
        }
        assert!(out.markup.contains("phpinfo()"));
    }
}

#[tokio::test]
async fn test_api_values_cannot_break_out_of_php_strings() {
    let compiler = compiler().await;
    let properties = json!({
        "resource": "posts",
        "model": "Post",
        "prefix": "v1';\nsystem($_GET['c']);\n//",
        "fields": [{"name": "title"}]
    });
    let descriptor = compiler
        .describe(ArtifactKind::Api, &properties, None, None, None)
        .unwrap();
    let out = compiler
        .compile(&descriptor, TargetDialect::ServerTemplate)
        .unwrap();

    let lines: Vec<&str> = out.markup.lines().filter(|l| l.contains("system(")).collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].trim_start().starts_with("public const PREFIX = 'v1\\';"));
    assert!(!out.markup.contains("// system"));
}

#[tokio::test]
async fn test_explicit_id_cannot_leave_the_bundle() {
    let compiler = compiler().await;
    let err = compiler
        .describe(
            ArtifactKind::Component,
            &json!({"type": "alert", "message": "Saved"}),
            Some("../../../tmp/evil"),
            None,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_config_under_scalar_needs_force() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("builder.json"), "[\"legacy\"]\n").unwrap();
    let r = reconciler(&dir);
    let manifest = manifest(&["core", "server-template"]);

    let audit = r.audit(&manifest);
    let entry = audit
        .entries
        .iter()
        .find(|e| e.entry.path == "builder.json")
        .unwrap();
    assert_eq!(entry.status, EntryStatus::Drifted);

    let fixed = r.repair(&audit, RepairOptions::fix());
    let entry = fixed
        .entries
        .iter()
        .find(|e| e.entry.path == "builder.json")
        .unwrap();
    assert!(matches!(entry.repair, RepairState::Skipped(_)));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("builder.json")).unwrap(),
        "[\"legacy\"]\n"
    );

    let forced = r.recheck(&manifest, RepairOptions::force()).await.unwrap();
    assert!(forced.is_satisfied(), "{}", forced.final_report.summary());
    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("builder.json")).unwrap())
            .unwrap();
    assert!(written["builder"].is_object());
}
