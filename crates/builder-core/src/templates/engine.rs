//! Render/compile engine
//!
//! One substitution algorithm serves every dialect: the dialects differ only
//! in template text and escaping mode, both of which come from the registry.

use super::escape::{json_literal, EscapeMode};
use super::parser::{Filter, Node, ParsedTemplate, Slot};
use super::registry::TemplateRegistry;
use crate::artifact::{is_valid_id, ArtifactDescriptor, ArtifactKind, Styles, TargetDialect};
use crate::error::CompileError;
use crate::schema::Resolver;
use crate::value::Value;
use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Output of one compile call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub markup: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// Wire-level compile request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileRequest {
    pub kind: ArtifactKind,
    pub dialect: TargetDialect,
    #[serde(default)]
    pub id: Option<String>,
    pub properties: serde_json::Value,
    #[serde(default)]
    pub styles: Option<Styles>,
    #[serde(default)]
    pub scripts: Option<String>,
}

/// Compiles resolved descriptors with templates from a shared registry
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<TemplateRegistry>,
    resolver: Resolver,
}

impl Compiler {
    pub fn new(registry: Arc<TemplateRegistry>, resolver: Resolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve and compile a raw request
    pub fn compile_request(&self, request: &CompileRequest) -> Result<CompiledArtifact, CompileError> {
        let descriptor = self.describe(
            request.kind,
            &request.properties,
            request.id.as_deref(),
            request.styles.clone(),
            request.scripts.clone(),
        )?;
        self.compile(&descriptor, request.dialect)
    }

    /// Resolve raw properties into a descriptor, applying an explicit id
    pub fn describe(
        &self,
        kind: ArtifactKind,
        properties: &serde_json::Value,
        id: Option<&str>,
        styles: Option<Styles>,
        scripts: Option<String>,
    ) -> Result<ArtifactDescriptor, CompileError> {
        let mut descriptor = self.resolver.resolve(kind, &Value::from(properties.clone()))?;
        if let Some(id) = id {
            if id.trim().is_empty() {
                return Err(CompileError::InvalidRequest("id must not be empty".to_string()));
            }
            if !is_valid_id(id) {
                return Err(CompileError::InvalidRequest(format!(
                    "id `{}` may only contain letters, digits, `-`, `_` and `.` and must not start with `.`",
                    id
                )));
            }
            descriptor = descriptor.with_id(id);
        }
        Ok(descriptor.with_styles(styles).with_scripts(scripts))
    }

    /// Compile a descriptor for one dialect
    pub fn compile(
        &self,
        descriptor: &ArtifactDescriptor,
        dialect: TargetDialect,
    ) -> Result<CompiledArtifact, CompileError> {
        let variant = descriptor.variant();
        let entry = self
            .registry
            .lookup(descriptor.kind, variant, dialect)
            .ok_or_else(|| CompileError::TemplateNotFound {
                kind: descriptor.kind.to_string(),
                variant: variant.map(str::to_string),
                dialect: dialect.to_string(),
            })?;
        debug!(kind = %descriptor.kind, id = %descriptor.id, %dialect, "compiling artifact");

        let root = Value::Map(descriptor.properties.clone());
        let render = |template: &ParsedTemplate, mode: EscapeMode| {
            Renderer {
                descriptor,
                dialect,
                raw: &entry.raw,
                mode,
            }
            .render(template, &root)
        };

        let markup = render(&entry.markup, entry.markup_escape)?;

        let mut script = entry
            .script
            .as_ref()
            .map(|t| render(t, entry.script_escape))
            .transpose()?;
        if let Some(extra) = descriptor.scripts.as_deref().filter(|s| !s.trim().is_empty()) {
            let out = script.get_or_insert_with(String::new);
            append_block(out, extra);
        }

        let mut style = entry
            .style
            .as_ref()
            .map(|t| render(t, EscapeMode::Css))
            .transpose()?;
        if let Some(styles) = &descriptor.styles {
            let out = style.get_or_insert_with(String::new);
            append_block(out, &author_styles(&descriptor.id, styles));
        }

        Ok(CompiledArtifact {
            markup,
            style,
            script,
        })
    }

    /// Compile a descriptor for every dialect registered for its key
    pub fn compile_all(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<Vec<(TargetDialect, CompiledArtifact)>, CompileError> {
        let dialects = self
            .registry
            .dialects_for(descriptor.kind, descriptor.variant());
        if dialects.is_empty() {
            return Err(CompileError::TemplateNotFound {
                kind: descriptor.kind.to_string(),
                variant: descriptor.variant().map(str::to_string),
                dialect: "any".to_string(),
            });
        }
        dialects
            .into_iter()
            .map(|dialect| self.compile(descriptor, dialect).map(|out| (dialect, out)))
            .collect()
    }
}

fn append_block(out: &mut String, block: &str) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(block);
    if !out.ends_with('\n') {
        out.push('\n');
    }
}

fn author_styles(id: &str, styles: &Styles) -> String {
    match styles {
        Styles::Raw(css) => css.clone(),
        Styles::Map(map) => {
            let mut css = format!("#{} {{\n", css_ident(id));
            for (property, value) in map {
                let property: String = property
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                    .collect();
                if property.is_empty() {
                    continue;
                }
                css.push_str(&format!("  {}: {};\n", property, EscapeMode::Css.escape(value)));
            }
            css.push_str("}\n");
            css
        }
    }
}

fn css_ident(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_string()
            } else {
                format!("\\{:x} ", c as u32)
            }
        })
        .collect()
}

/// PascalCase identifier derived from an artifact id
fn ident(id: &str) -> String {
    let pascal = id.to_upper_camel_case();
    if pascal.starts_with(|c: char| c.is_ascii_digit()) || pascal.is_empty() {
        format!("_{}", pascal)
    } else {
        pascal
    }
}

/// One level of slot lookup
struct Frame<'v> {
    value: &'v Value,
    /// Path without indices, used for raw-slot checks (`items.content`)
    logical: String,
    /// Path with indices, used in errors (`items[0].content`)
    concrete: String,
    /// (index, length) when the frame is a list element
    position: Option<(usize, usize)>,
}

fn qualify(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}.{}", prefix, path)
    }
}

struct Renderer<'a> {
    descriptor: &'a ArtifactDescriptor,
    dialect: TargetDialect,
    raw: &'a BTreeSet<String>,
    mode: EscapeMode,
}

impl<'a> Renderer<'a> {
    fn render(&self, template: &ParsedTemplate, root: &Value) -> Result<String, CompileError> {
        let mut frames = vec![Frame {
            value: root,
            logical: String::new(),
            concrete: String::new(),
            position: None,
        }];
        let mut out = String::new();
        self.render_nodes(&template.nodes, &mut frames, &mut out)?;
        Ok(out)
    }

    fn render_nodes<'v>(
        &self,
        nodes: &[Node],
        frames: &mut Vec<Frame<'v>>,
        out: &mut String,
    ) -> Result<(), CompileError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Slot(slot) => self.render_slot(slot, frames, out)?,
                Node::Each { path, body } => {
                    let (value, logical, concrete) = self
                        .lookup(path, frames)
                        .ok_or_else(|| CompileError::UnresolvedSlot(self.missing_path(path, frames)))?;
                    let items = value
                        .as_array()
                        .ok_or_else(|| CompileError::UnresolvedSlot(concrete.clone()))?;
                    for (i, item) in items.iter().enumerate() {
                        frames.push(Frame {
                            value: item,
                            logical: logical.clone(),
                            concrete: format!("{}[{}]", concrete, i),
                            position: Some((i, items.len())),
                        });
                        let result = self.render_nodes(body, frames, out);
                        frames.pop();
                        result?;
                    }
                }
                Node::If {
                    path,
                    negate,
                    then,
                    otherwise,
                } => {
                    let truthy = self
                        .special(path, frames)
                        .map(|v| v.is_truthy())
                        .or_else(|| self.lookup(path, frames).map(|(v, _, _)| v.is_truthy()))
                        .unwrap_or(false);
                    let branch = if truthy != *negate { then } else { otherwise };
                    self.render_nodes(branch, frames, out)?;
                }
            }
        }
        Ok(())
    }

    fn render_slot(&self, slot: &Slot, frames: &[Frame<'_>], out: &mut String) -> Result<(), CompileError> {
        let (value, logical): (Cow<'_, Value>, String) = match self.special(&slot.path, frames) {
            Some(value) => (Cow::Owned(value), slot.path.clone()),
            None => match self.lookup(&slot.path, frames) {
                Some((value, logical, _)) => (Cow::Borrowed(value), logical),
                None if slot.optional => return Ok(()),
                None => {
                    return Err(CompileError::UnresolvedSlot(
                        self.missing_path(&slot.path, frames),
                    ))
                }
            },
        };

        // A leading `json` encodes the value itself (lists stay lists); after
        // other filters it encodes the filtered text.
        let mut encoded = false;
        let mut text = value.to_string();
        for (i, filter) in slot.filters.iter().enumerate() {
            text = match filter {
                Filter::Snake => text.to_snake_case(),
                Filter::Kebab => text.to_kebab_case(),
                Filter::Camel => text.to_lower_camel_case(),
                Filter::Pascal => text.to_upper_camel_case(),
                Filter::Upper => text.to_uppercase(),
                Filter::Lower => text.to_lowercase(),
                Filter::Json if i == 0 => {
                    encoded = true;
                    json_literal(&value.to_json())
                }
                Filter::Json => {
                    encoded = true;
                    json_literal(&serde_json::Value::String(text))
                }
            };
        }

        if encoded || self.raw.contains(&logical) {
            out.push_str(&text);
        } else {
            out.push_str(&self.mode.escape(&text));
        }
        Ok(())
    }

    /// Resolve `@` specials; `None` when the path is not a special
    fn special(&self, path: &str, frames: &[Frame<'_>]) -> Option<Value> {
        let position = frames.iter().rev().find_map(|f| f.position);
        match path {
            "@id" => Some(Value::from(self.descriptor.id.as_str())),
            "@ident" => Some(Value::from(ident(&self.descriptor.id))),
            "@kind" => Some(Value::from(self.descriptor.kind.as_str())),
            "@dialect" => Some(Value::from(self.dialect.as_str())),
            "@index" => position.map(|(i, _)| Value::Number(i as f64)),
            "@number" => position.map(|(i, _)| Value::Number((i + 1) as f64)),
            "@first" => position.map(|(i, _)| Value::Bool(i == 0)),
            "@last" => position.map(|(i, len)| Value::Bool(i + 1 == len)),
            _ => None,
        }
    }

    /// Find a path, innermost scope first
    fn lookup<'v>(&self, path: &str, frames: &[Frame<'v>]) -> Option<(&'v Value, String, String)> {
        if path == "this" {
            let frame = frames.last()?;
            return Some((frame.value, frame.logical.clone(), frame.concrete.clone()))
                .filter(|(v, _, _)| !v.is_null());
        }

        let mut segments = path.split('.');
        let head = segments.next()?;
        for frame in frames.iter().rev() {
            let Some(mut value) = frame.value.get(head) else {
                continue;
            };
            for segment in segments.by_ref() {
                value = value.get(segment)?;
            }
            if value.is_null() {
                return None;
            }
            return Some((
                value,
                qualify(&frame.logical, path),
                qualify(&frame.concrete, path),
            ));
        }
        None
    }

    fn missing_path(&self, path: &str, frames: &[Frame<'_>]) -> String {
        let scope = frames.last().map(|f| f.concrete.as_str()).unwrap_or_default();
        qualify(scope, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::manifest::CatalogFile;
    use serde_json::json;

    fn compiler(yaml: &str) -> Compiler {
        let file = CatalogFile::parse("test.yaml", yaml).unwrap();
        let registry = TemplateRegistry::from_catalogs([("test.yaml", &file)]).unwrap();
        Compiler::new(Arc::new(registry), Resolver::builtin())
    }

    const PAGE: &str = r#"
kind: page
templates:
  - dialect: server-template
    markup: "<h1>[[ title ]]</h1>[[#each sections]]<section id=\"[[ id ]]\">[[ html ]]</section>[[/each]]"
    raw: [sections.html]
  - dialect: component-framework-a
    markup: "<h1>[[ title | upper ]]</h1>"
    script: "const page = '[[ slug ]]'; const n = [[ sections | json ]];"
    style: ".page-[[ @ident ]] { font-family: [[ layout ]]; }"
"#;

    fn page(props: serde_json::Value) -> ArtifactDescriptor {
        Resolver::builtin()
            .resolve(ArtifactKind::Page, &Value::from(props))
            .unwrap()
            .with_id("home")
    }

    #[test]
    fn test_escapes_by_default_and_honors_raw() {
        let c = compiler(PAGE);
        let d = page(json!({
            "title": "<script>x</script>",
            "slug": "home",
            "sections": [{"id": "s1", "html": "<b>bold</b>"}]
        }));
        let out = c.compile(&d, TargetDialect::ServerTemplate).unwrap();
        assert!(out.markup.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(out.markup.contains("<b>bold</b>"));
        assert!(out.script.is_none());
        assert!(out.style.is_none());
    }

    #[test]
    fn test_script_and_style_sections() {
        let c = compiler(PAGE);
        let d = page(json!({"title": "Home", "slug": "it's", "sections": []}));
        let out = c.compile(&d, TargetDialect::ComponentFrameworkA).unwrap();
        assert_eq!(out.markup, "<h1>HOME</h1>");
        assert_eq!(
            out.script.as_deref(),
            Some("const page = 'it\\'s'; const n = [];")
        );
        assert_eq!(
            out.style.as_deref(),
            Some(".page-Home { font-family: app; }")
        );
    }

    #[test]
    fn test_missing_dialect_is_template_not_found() {
        let c = compiler(PAGE);
        let d = page(json!({"title": "Home", "slug": "home"}));
        let err = c.compile(&d, TargetDialect::ComponentFrameworkB).unwrap_err();
        assert!(matches!(err, CompileError::TemplateNotFound { ref dialect, .. } if dialect == "component-framework-b"));
    }

    #[test]
    fn test_unresolved_slot_aborts() {
        let c = compiler(
            "kind: page\ntemplates:\n  - dialect: blade\n    markup: \"[[#each sections]][[ missing ]][[/each]]\"\n",
        );
        let d = page(json!({"title": "Home", "slug": "home", "sections": [{"id": "a"}]}));
        let err = c.compile(&d, TargetDialect::ServerTemplate).unwrap_err();
        assert_eq!(err, CompileError::UnresolvedSlot("sections[0].missing".into()));
    }

    #[test]
    fn test_optional_slot_and_specials() {
        let c = compiler(
            "kind: page\ntemplates:\n  - dialect: blade\n    markup: \"[[ nope? ]][[#each sections]][[ @number ]]:[[ id ]][[#unless @last]],[[/unless]][[/each]]|[[ @kind ]]|[[ @dialect ]]\"\n",
        );
        let d = page(json!({"title": "T", "slug": "t", "sections": [{"id": "a"}, {"id": "b"}, {"id": "c"}]}));
        let out = c.compile(&d, TargetDialect::ServerTemplate).unwrap();
        assert_eq!(out.markup, "1:a,2:b,3:c|page|server-template");
    }

    #[test]
    fn test_author_styles_and_scripts_appended() {
        let c = compiler(PAGE);
        let mut styles = indexmap::IndexMap::new();
        styles.insert("color".to_string(), "red; }".to_string());
        let d = page(json!({"title": "Home", "slug": "home"}))
            .with_styles(Some(Styles::Map(styles)))
            .with_scripts(Some("console.log('hi');".to_string()));
        let out = c.compile(&d, TargetDialect::ServerTemplate).unwrap();
        let style = out.style.unwrap();
        assert!(style.starts_with("#home {\n  color: red\\3b  \\7d ;\n}"));
        assert_eq!(out.script.as_deref(), Some("console.log('hi');\n"));
    }

    #[test]
    fn test_compile_request_applies_id() {
        let c = compiler(PAGE);
        let request: CompileRequest = serde_json::from_value(json!({
            "kind": "page",
            "dialect": "react",
            "id": "landing",
            "properties": {"title": "Hi", "slug": "hi"}
        }))
        .unwrap();
        let out = c.compile_request(&request).unwrap();
        assert!(out.style.unwrap().contains(".page-Landing"));
    }

    #[test]
    fn test_ids_that_escape_a_directory_are_rejected() {
        let c = compiler(PAGE);
        let props = json!({"title": "Hi", "slug": "hi"});
        for id in ["../../../tmp/evil", "nested/page", ".env"] {
            let err = c
                .describe(ArtifactKind::Page, &props, Some(id), None, None)
                .unwrap_err();
            assert!(matches!(err, CompileError::InvalidRequest(_)), "{} was accepted", id);
            assert_eq!(err.to_body().error_kind, "InvalidRequest");
        }
        assert_eq!(
            c.describe(ArtifactKind::Page, &props, Some("page.home"), None, None)
                .unwrap()
                .id,
            "page.home"
        );
    }

    #[test]
    fn test_ident_handles_leading_digits() {
        assert_eq!(ident("x1"), "X1");
        assert_eq!(ident("faq-main"), "FaqMain");
        assert_eq!(ident("1abc"), "_1abc");
    }
}
